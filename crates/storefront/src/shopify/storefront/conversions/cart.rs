//! Cart type conversion functions.

use vdubs_core::{CartId, CartLineId, VariantId};

use crate::shopify::types::{
    Cart, CartHandle, CartLine, CartMerchandise, CartMutation, CartUserError,
};

use super::super::queries::fields::{CartMutationPayload, CartUserErrorFields};
use super::super::queries::get_cart;
use super::{convert_image, convert_money};

/// Convert a fetched cart.
pub fn convert_cart(cart: get_cart::CartFields) -> Cart {
    let (subtotal, total) = cart.cost.map_or((None, None), |cost| {
        (
            cost.subtotal_amount.map(convert_money),
            cost.total_amount.map(convert_money),
        )
    });

    Cart {
        id: CartId::new(cart.id),
        checkout_url: cart.checkout_url,
        total_quantity: cart.total_quantity,
        subtotal,
        total,
        lines: cart
            .lines
            .edges
            .into_iter()
            .map(|edge| convert_cart_line(edge.node))
            .collect(),
    }
}

fn convert_cart_line(line: get_cart::CartLineFields) -> CartLine {
    let variant = line.merchandise;
    CartLine {
        id: CartLineId::new(line.id),
        quantity: line.quantity,
        merchandise: CartMerchandise {
            variant_id: VariantId::new(variant.id),
            title: variant.title,
            image: variant.image.map(convert_image),
            price: variant.price.map(convert_money),
            product_title: variant.product.title,
            product_handle: variant.product.handle,
        },
    }
}

/// Convert any cart mutation payload. A missing payload converts to an
/// empty mutation (no cart, no user errors).
pub fn convert_mutation(payload: Option<CartMutationPayload>) -> CartMutation {
    let Some(payload) = payload else {
        return CartMutation::default();
    };

    CartMutation {
        cart: payload.cart.map(|cart| CartHandle {
            id: CartId::new(cart.id),
            checkout_url: cart.checkout_url,
        }),
        user_errors: payload
            .user_errors
            .into_iter()
            .map(convert_user_error)
            .collect(),
    }
}

/// Convert a `CartUserError`.
pub fn convert_user_error(e: CartUserErrorFields) -> CartUserError {
    CartUserError {
        message: e.message,
        field: e.field,
        code: e.code,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_cart_flattens_lines() {
        let raw: get_cart::ResponseData = serde_json::from_value(serde_json::json!({
            "cart": {
                "id": "gid://shopify/Cart/c1",
                "checkoutUrl": "https://shop.example/checkout/c1",
                "totalQuantity": 3,
                "cost": {
                    "subtotalAmount": { "amount": "30.0", "currencyCode": "EUR" },
                    "totalAmount": { "amount": "30.0", "currencyCode": "EUR" }
                },
                "lines": { "edges": [{
                    "node": {
                        "id": "gid://shopify/CartLine/l1",
                        "quantity": 3,
                        "merchandise": {
                            "id": "gid://shopify/ProductVariant/A",
                            "title": "Near Mint",
                            "image": null,
                            "price": { "amount": "10.0", "currencyCode": "EUR" },
                            "product": { "title": "Pikachu", "handle": "pikachu" }
                        }
                    }
                }]}
            }
        }))
        .unwrap();

        let cart = convert_cart(raw.cart.unwrap());
        assert_eq!(cart.id.as_str(), "gid://shopify/Cart/c1");
        assert_eq!(cart.total_quantity, 3);
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].merchandise.variant_id.as_str(), "gid://shopify/ProductVariant/A");
        assert_eq!(cart.lines[0].merchandise.product_handle, "pikachu");
        assert_eq!(cart.total.unwrap().amount, "30.0");
    }

    #[test]
    fn test_convert_missing_payload() {
        let mutation = convert_mutation(None);
        assert!(mutation.cart.is_none());
        assert!(mutation.user_errors.is_empty());
    }

    #[test]
    fn test_convert_mutation_keeps_error_codes() {
        let payload: CartMutationPayload = serde_json::from_value(serde_json::json!({
            "cart": null,
            "userErrors": [{ "field": ["lines", "0"], "message": "Invalid", "code": "INVALID" }]
        }))
        .unwrap();

        let mutation = convert_mutation(Some(payload));
        assert!(mutation.cart.is_none());
        assert_eq!(mutation.user_errors[0].code.as_deref(), Some("INVALID"));
        assert_eq!(
            mutation.user_errors[0].field,
            Some(vec!["lines".to_string(), "0".to_string()])
        );
    }
}
