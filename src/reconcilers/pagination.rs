// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pagination helpers for Kubernetes API list operations.
//!
//! Every list the reconcilers perform (Ingresses, IngressClasses,
//! Deployments) must exhaust all pages before acting: claim decisions and the
//! full-list republish cannot be made from a partial view.

use anyhow::Result;
use kube::{api::ListParams, Api, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::{debug, error};

use crate::constants::KUBE_LIST_PAGE_SIZE;

/// Hard cap on pages fetched per list, guarding against a continue token
/// that never drains.
const MAX_REASONABLE_PAGES: usize = 10_000;

/// List all resources matching `list_params`, fetching page by page.
///
/// # Errors
///
/// Returns an error if a Kubernetes API list call fails.
pub async fn list_all_paginated<K>(api: &Api<K>, mut list_params: ListParams) -> Result<Vec<K>>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    list_params.limit = Some(KUBE_LIST_PAGE_SIZE);

    let mut all_items = Vec::new();
    let mut page_count = 0usize;
    let mut last_continue_token: Option<String> = None;

    loop {
        page_count += 1;

        let result = api.list(&list_params).await?;
        let item_count = result.items.len();

        // The API sometimes returns Some("") instead of None on the last page.
        let new_continue_token = result
            .metadata
            .continue_
            .clone()
            .filter(|token| !token.is_empty());

        // A repeated continue token would page forever.
        if new_continue_token.is_some() && new_continue_token == last_continue_token {
            error!(
                page = page_count,
                continue_token = ?new_continue_token,
                "same continue token returned twice, aborting pagination"
            );
            break;
        }

        if item_count == 0 && new_continue_token.is_some() {
            error!(
                page = page_count,
                continue_token = ?new_continue_token,
                "empty page with a continue token, aborting pagination"
            );
            break;
        }

        all_items.extend(result.items);

        debug!(
            page = page_count,
            items_in_page = item_count,
            total_items = all_items.len(),
            "fetched page from the Kubernetes API"
        );

        match new_continue_token {
            Some(token) => {
                last_continue_token = Some(token.clone());
                list_params.continue_token = Some(token);
            }
            None => break,
        }

        if page_count >= MAX_REASONABLE_PAGES {
            error!(
                page = page_count,
                total_items = all_items.len(),
                "pagination safety limit exceeded, aborting"
            );
            break;
        }
    }

    Ok(all_items)
}
