//! Type conversion functions for Shopify Storefront API responses.

pub mod cart;
pub mod products;

pub use cart::{convert_cart, convert_mutation};
pub use products::{convert_product_card, convert_product_connection, convert_search};

use crate::shopify::types::{Image, Menu, MenuItem, Money};

use super::queries::fields::{ImageFields, MenuItemFields, MoneyFields};
use super::queries::get_menu;

pub fn convert_money(money: MoneyFields) -> Money {
    Money {
        amount: money.amount,
        currency_code: money.currency_code,
    }
}

pub fn convert_image(image: ImageFields) -> Image {
    Image {
        url: image.url,
        alt_text: image.alt_text,
        width: image.width,
        height: image.height,
    }
}

pub fn convert_menu(menu: get_menu::MenuFields) -> Menu {
    Menu {
        handle: menu.handle,
        title: menu.title,
        items: menu.items.into_iter().map(convert_menu_item).collect(),
    }
}

fn convert_menu_item(item: MenuItemFields) -> MenuItem {
    MenuItem {
        id: item.id,
        title: item.title,
        url: item.url,
        kind: item.kind,
        items: item.items.into_iter().map(convert_menu_item).collect(),
    }
}
