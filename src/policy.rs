//! Order policies: decide where each tab of a window should go.

use crate::model::{Tab, TabId};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Produces the desired order for the reorderable tabs of one window.
///
/// The result should be a permutation of the input ids. Anything else is
/// tolerated by the planner but leaves the offending tabs where they are.
#[async_trait]
pub trait OrderPolicy: Send + Sync {
    async fn desired_order(&self, tabs: &[Tab]) -> Result<Vec<TabId>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Group tabs by container, groups in order of first appearance
    #[default]
    Container,
    /// Case-insensitive title
    Title,
    /// Full URL
    Url,
    /// URL host, then full URL
    Host,
    /// Keep the current order
    None,
}

/// Stable sort on a single tab property. Ties keep their current order.
#[derive(Debug, Clone, Copy)]
pub struct SortKeyPolicy {
    key: SortKey,
}

impl SortKeyPolicy {
    pub fn new(key: SortKey) -> Self {
        Self { key }
    }

    fn sorted(&self, tabs: &[Tab]) -> Vec<TabId> {
        let mut order: Vec<&Tab> = tabs.iter().collect();
        match self.key {
            SortKey::None => {}
            SortKey::Container => {
                let mut rank: HashMap<Option<&str>, usize> = HashMap::new();
                for t in tabs {
                    let next = rank.len();
                    rank.entry(t.container.as_deref()).or_insert(next);
                }
                order.sort_by_key(|t| rank[&t.container.as_deref()]);
            }
            SortKey::Title => order.sort_by(|a, b| {
                missing_last(
                    a.title.as_deref().map(str::to_lowercase),
                    b.title.as_deref().map(str::to_lowercase),
                )
            }),
            SortKey::Url => order.sort_by(|a, b| missing_last(a.url.as_deref(), b.url.as_deref())),
            SortKey::Host => order.sort_by(|a, b| {
                let ka = a.url.as_deref().map(|u| (host_of(u), u));
                let kb = b.url.as_deref().map(|u| (host_of(u), u));
                missing_last(ka, kb)
            }),
        }
        order.into_iter().map(|t| t.id).collect()
    }
}

#[async_trait]
impl OrderPolicy for SortKeyPolicy {
    async fn desired_order(&self, tabs: &[Tab]) -> Result<Vec<TabId>> {
        Ok(self.sorted(tabs))
    }
}

fn missing_last<K: Ord>(a: Option<K>, b: Option<K>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Host part of a URL, lowercased, without userinfo or port.
fn host_of(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, r)| r);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = match host.strip_prefix('[') {
        Some(v6) => v6.split(']').next().unwrap_or_default(),
        None => host.split(':').next().unwrap_or_default(),
    };
    host.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tab(id: u64, container: Option<&str>, title: Option<&str>, url: Option<&str>) -> Tab {
        Tab {
            container: container.map(String::from),
            title: title.map(String::from),
            url: url.map(String::from),
            ..Tab::new(id)
        }
    }

    fn ids(v: &[u64]) -> Vec<TabId> {
        v.iter().copied().map(TabId).collect()
    }

    #[tokio::test]
    async fn container_groups_follow_first_appearance() {
        let tabs = vec![
            tab(1, Some("work"), None, None),
            tab(2, Some("home"), None, None),
            tab(3, Some("work"), None, None),
            tab(4, None, None, None),
            tab(5, Some("home"), None, None),
        ];
        let order = SortKeyPolicy::new(SortKey::Container)
            .desired_order(&tabs)
            .await
            .unwrap();
        assert_eq!(order, ids(&[1, 3, 2, 5, 4]));
    }

    #[tokio::test]
    async fn title_sort_is_case_insensitive_and_stable() {
        let tabs = vec![
            tab(1, None, Some("beta"), None),
            tab(2, None, None, None),
            tab(3, None, Some("Alpha"), None),
            tab(4, None, Some("alpha"), None),
        ];
        let order = SortKeyPolicy::new(SortKey::Title)
            .desired_order(&tabs)
            .await
            .unwrap();
        assert_eq!(order, ids(&[3, 4, 1, 2]));
    }

    #[tokio::test]
    async fn host_sort_groups_by_host_before_url() {
        let tabs = vec![
            tab(1, None, None, Some("https://zeta.example/a")),
            tab(2, None, None, Some("http://Alpha.example:8080/z")),
            tab(3, None, None, Some("https://alpha.example/b")),
        ];
        let order = SortKeyPolicy::new(SortKey::Host)
            .desired_order(&tabs)
            .await
            .unwrap();
        assert_eq!(order, ids(&[2, 3, 1]));
    }

    #[test]
    fn host_of_handles_userinfo_and_ipv6() {
        assert_eq!(host_of("https://user:pw@Example.COM:443/x"), "example.com");
        assert_eq!(host_of("http://[::1]:8000/"), "::1");
        assert_eq!(host_of("about:blank"), "about");
    }
}
