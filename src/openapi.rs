use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        description = "Cart, checkout and payment reconciliation endpoints"
    ),
    paths(
        crate::handlers::orders::create_cod_order,
        crate::handlers::orders::create_checkout_session,
        crate::handlers::orders::fetch_orders,
        crate::handlers::webhooks::payment_webhook,
        crate::handlers::addresses::create_address,
        crate::handlers::addresses::fetch_addresses,
        crate::handlers::addresses::update_address,
        crate::handlers::addresses::delete_address,
        crate::handlers::carts::add_cart_item,
        crate::handlers::carts::fetch_cart_items,
        crate::handlers::carts::update_cart_item,
        crate::handlers::carts::remove_cart_item,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::services::checkout::CheckoutRequest,
        crate::services::checkout::CheckoutItem,
        crate::handlers::addresses::CreateAddressRequest,
        crate::handlers::addresses::UpdateAddressRequest,
        crate::handlers::carts::UpdateCartItemRequest,
    )),
    tags(
        (name = "Orders", description = "Checkout, order ledger and webhook reconciliation"),
        (name = "Addresses", description = "Delivery address store"),
        (name = "Cart", description = "Per-user cart lines")
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at /swagger-ui, serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
