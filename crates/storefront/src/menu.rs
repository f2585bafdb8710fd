//! Main navigation built from Shopify menus.
//!
//! Stores name their header menu differently, so several handles are tried
//! and the richest tree wins. Tokenless requests are tried first because
//! token-scoped requests sometimes return a flattened menu.

use std::future::Future;

use serde::Serialize;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::shopify::{Access, Menu, MenuItem, ShopifyError, StorefrontClient};

/// Menu handles tried in order.
pub const MENU_HANDLES: &[&str] = &["main-menu", "main_menu", "header", "navigation"];

/// A navigation link as rendered in the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavLink {
    pub href: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Self>>,
}

impl NavLink {
    fn leaf(href: &str, label: &str) -> Self {
        Self {
            href: href.to_string(),
            label: label.to_string(),
            children: None,
        }
    }

    fn parent(href: &str, label: &str, children: Vec<Self>) -> Self {
        Self {
            href: href.to_string(),
            label: label.to_string(),
            children: Some(children),
        }
    }
}

/// The chosen navigation plus the Shopify menu it came from.
#[derive(Debug, Clone)]
pub struct MainMenu {
    pub links: Vec<NavLink>,
    /// `None` when the default navigation is used.
    pub raw: Option<Menu>,
}

impl MainMenu {
    #[must_use]
    pub fn total_item_count(&self) -> usize {
        count_links(&self.links)
    }
}

/// Load the main navigation from Shopify.
#[instrument(skip(client))]
pub async fn main_menu(client: &StorefrontClient) -> MainMenu {
    let has_token = client.has_access_token();
    resolve_menu(has_token, |handle, access| client.get_menu(handle, access)).await
}

/// Try each candidate handle and keep the tree with the most items.
///
/// `fetch` is called with [`Access::Tokenless`] first; when that yields no
/// items and `has_token` is set, the handle is fetched again with the token.
/// Failures are skipped.
pub async fn resolve_menu<F, Fut>(has_token: bool, mut fetch: F) -> MainMenu
where
    F: FnMut(&'static str, Access) -> Fut,
    Fut: Future<Output = Result<Option<Menu>, ShopifyError>>,
{
    let mut best = MainMenu {
        links: Vec::new(),
        raw: None,
    };
    let mut best_count = 0;

    for &handle in MENU_HANDLES {
        let menu = match fetch(handle, Access::Tokenless).await {
            Ok(Some(menu)) if !menu.items.is_empty() => Ok(Some(menu)),
            Ok(_) if has_token => fetch(handle, Access::Default).await,
            other => other,
        };

        let menu = match menu {
            Ok(Some(menu)) => menu,
            Ok(None) => {
                debug!(handle, "Menu not found");
                continue;
            }
            Err(e) => {
                warn!(handle, error = %e, "Failed to fetch menu");
                continue;
            }
        };

        let links = to_nav_links(&menu.items);
        let total = count_links(&links);
        if total > best_count {
            best_count = total;
            best = MainMenu {
                links,
                raw: Some(menu),
            };
        }
    }

    if best.links.is_empty() {
        return MainMenu {
            links: default_menu(),
            raw: None,
        };
    }

    best
}

/// Convert Shopify menu items to navigation links.
#[must_use]
pub fn to_nav_links(items: &[MenuItem]) -> Vec<NavLink> {
    items.iter().map(to_nav_link).collect()
}

fn to_nav_link(item: &MenuItem) -> NavLink {
    let raw_url = item
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or("#");
    let href = normalize_href(relative_path(raw_url), &item.title);
    let children = to_nav_links(&item.items);

    NavLink {
        href,
        label: item.title.clone(),
        children: (!children.is_empty()).then_some(children),
    }
}

/// Turn an absolute storefront URL into a site-relative path.
fn relative_path(url: &str) -> String {
    if url.is_empty() || url == "#" {
        return "#".to_string();
    }

    match Url::parse(url) {
        Ok(parsed) => {
            let mut path = parsed.path().to_string();
            if let Some(query) = parsed.query() {
                path.push('?');
                path.push_str(query);
            }
            if let Some(fragment) = parsed.fragment() {
                path.push('#');
                path.push_str(fragment);
            }
            if path.is_empty() {
                "/".to_string()
            } else {
                path
            }
        }
        Err(_) if url.starts_with('/') => url.to_string(),
        Err(_) => format!("/{url}"),
    }
}

fn normalize_href(href: String, label: &str) -> String {
    if label.trim().eq_ignore_ascii_case("events") {
        return "/events".to_string();
    }

    match href.as_str() {
        "/pages/about-us" => "/about".to_string(),
        "/pages/contact" => "/contact".to_string(),
        _ => href,
    }
}

/// Number of links including all nested children.
#[must_use]
pub fn count_links(links: &[NavLink]) -> usize {
    links
        .iter()
        .map(|link| 1 + link.children.as_deref().map_or(0, count_links))
        .sum()
}

/// Navigation used when Shopify returns no usable menu.
#[must_use]
pub fn default_menu() -> Vec<NavLink> {
    let singles = vec![
        NavLink::leaf("/collections/soccer-card", "Soccer Cards"),
        NavLink::leaf("/collections/nfl-cards", "NFL Cards"),
        NavLink::leaf("/collections/nba-cards", "NBA Cards"),
        NavLink::leaf("/collections/woman-football-cards", "Women's Soccer Cards"),
        NavLink::leaf("/collections/graded-cards", "Graded Cards"),
        NavLink::leaf("/collections/ufc-cards", "UFC Cards"),
        NavLink::leaf("/collections/f1", "F1 Cards"),
        NavLink::leaf("/collections/entertainment", "Entertainment"),
        NavLink::leaf("/collections/baseball", "Baseball Cards"),
        NavLink::leaf("/collections/wwe-cards", "WWE Cards"),
        NavLink::leaf("/collections/pokemon", "Pokemon Cards"),
        NavLink::leaf("/collections/other-sports", "Other Sports"),
    ];

    vec![
        NavLink::parent(
            "/collections/all",
            "Shop",
            vec![
                NavLink::parent("/collections/single-cards", "Single Cards", singles),
                NavLink::leaf("/collections/lots-sets", "Lots & Sets"),
                NavLink::leaf("/collections/boxes-packs", "Boxes and Packs"),
                NavLink::leaf("/collections/comics", "Comics"),
                NavLink::leaf("/collections/collectables", "Collectibles"),
                NavLink::leaf("/collections/supplies", "Supplies"),
            ],
        ),
        NavLink::leaf("/collections/sale", "Sale"),
        NavLink::leaf("/about", "About"),
        NavLink::leaf("/events", "Events"),
        NavLink::leaf("/contact", "Contact"),
        NavLink::leaf("/collections/new-drop", "New Drop"),
    ]
}
