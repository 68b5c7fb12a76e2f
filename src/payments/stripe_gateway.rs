use async_trait::async_trait;
use std::collections::HashMap;

use super::{HostedCheckout, HostedSession, PaymentError, PaymentEvent, PaymentGateway};

pub struct StripeGateway {
    client: stripe::Client,
    webhook_secret: Option<String>,
}

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>, webhook_secret: Option<String>) -> Self {
        Self { client: stripe::Client::new(secret_key), webhook_secret }
    }
}

fn currency(code: &str) -> Result<stripe::Currency, PaymentError> {
    serde_json::from_value(serde_json::Value::String(code.to_lowercase()))
        .map_err(|_| PaymentError::InvalidAmount(format!("unsupported currency {code}")))
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[tracing::instrument(name = "stripe.create_checkout_session", skip_all, fields(transaction_id = %checkout.transaction_id))]
    async fn create_checkout_session(&self, checkout: HostedCheckout) -> Result<HostedSession, PaymentError> {
        let currency = currency(&checkout.currency)?;
        let client_ref = checkout.transaction_id.to_string();

        let mut params = stripe::CreateCheckoutSession::new();
        params.success_url = Some(&checkout.success_url);
        params.cancel_url = Some(&checkout.cancel_url);
        params.mode = Some(stripe::CheckoutSessionMode::Payment);
        params.client_reference_id = Some(&client_ref);
        params.customer_email = checkout.customer_email.as_deref();
        params.line_items = Some(checkout.lines.iter().map(|line| stripe::CreateCheckoutSessionLineItems {
            price_data: Some(stripe::CreateCheckoutSessionLineItemsPriceData {
                currency: currency.clone(),
                product_data: Some(stripe::CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: line.name.clone(),
                    ..Default::default()
                }),
                unit_amount: Some(line.unit_amount),
                ..Default::default()
            }),
            quantity: Some(line.quantity),
            ..Default::default()
        }).collect());
        if let Some(coupon) = &checkout.coupon {
            params.discounts = Some(vec![stripe::CreateCheckoutSessionDiscounts {
                coupon: Some(coupon.clone()),
                ..Default::default()
            }]);
        }
        params.metadata = Some(HashMap::from([("transaction_id".to_string(), client_ref.clone())]));

        let session = stripe::CheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to create Stripe checkout session");
                PaymentError::Gateway(e.to_string())
            })?;

        Ok(HostedSession { id: session.id.to_string(), url: session.url })
    }

    fn parse_webhook(&self, payload: &str, signature: &str) -> Result<PaymentEvent, PaymentError> {
        let secret = self.webhook_secret.as_deref().ok_or(PaymentError::NotConfigured)?;
        let event = stripe::Webhook::construct_event(payload, signature, secret)
            .map_err(|e| PaymentError::InvalidWebhook(format!("Failed to verify webhook signature: {e}")))?;

        match (event.type_, event.data.object) {
            (stripe::EventType::CheckoutSessionCompleted, stripe::EventObject::CheckoutSession(session)) => {
                let reference = session.client_reference_id
                    .ok_or_else(|| PaymentError::InvalidWebhook("checkout session without client reference".to_string()))?;
                let transaction_id = reference.parse()
                    .map_err(|_| PaymentError::InvalidWebhook(format!("unknown client reference {reference}")))?;
                Ok(PaymentEvent::CheckoutCompleted {
                    transaction_id,
                    paid: session.payment_status == stripe::CheckoutSessionPaymentStatus::Paid,
                })
            }
            (other, _) => Ok(PaymentEvent::Ignored(other.to_string())),
        }
    }
}
