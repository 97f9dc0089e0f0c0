use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Membership Checkout API",
        version = "0.1.0",
        description = r#"
Checkout backend for the membership site.

## Flow

1. `POST /orders/create` creates a Razorpay order for the tax-inclusive amount.
2. The checkout widget collects payment and returns `razorpay_order_id`,
   `razorpay_payment_id` and `razorpay_signature`.
3. `POST /payments/verify` checks the signature server-side.
4. `POST /registrations` records the attendee. With coupon `INNERCIRCLE`
   steps 1-3 are skipped and the amount is 0.

## Errors

```json
{
  "success": false,
  "error": "duplicate coupon redemption",
  "code": "duplicate_coupon_redemption",
  "request_id": "req-abc123",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#
    ),
    tags(
        (name = "Checkout", description = "Orders, payment verification and registrations"),
        (name = "Notifications", description = "SMS and WhatsApp messages"),
        (name = "Plans", description = "Membership plan reference data"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::orders::create_order,
        crate::handlers::payments::verify_payment,
        crate::handlers::registrations::create_registration,
        crate::handlers::registrations::get_registration,
        crate::handlers::notifications::send_notification,
        crate::handlers::plans::list_plans,
        crate::handlers::plans::get_plan,
        crate::handlers::health::health,
    ),
    components(
        schemas(
            crate::handlers::orders::CreateOrderRequest,
            crate::handlers::orders::CreateOrderResponse,
            crate::handlers::orders::OrderSummary,
            crate::handlers::payments::VerifyPaymentRequest,
            crate::handlers::payments::VerifyPaymentResponse,
            crate::handlers::registrations::RegisterRequest,
            crate::handlers::registrations::RegisterResponse,
            crate::handlers::registrations::RegistrationView,
            crate::handlers::notifications::SendNotificationRequest,
            crate::handlers::notifications::SendNotificationResponse,
            crate::handlers::plans::PlanView,
            crate::handlers::health::HealthResponse,
            crate::handlers::health::ComponentStatus,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_checkout_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/orders/create",
            "/payments/verify",
            "/registrations",
            "/notifications/send",
            "/plans/{slug}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
