use std::sync::Arc;

use bookingnotify::APP_NAME;
use bookingnotify::firestore::TriggerPayload;
use bookingnotify::messaging::FcmClient;
use bookingnotify::types::ChangeEvent;
use jluszcz_rust_utils::lambda;
use lambda_runtime::{LambdaEvent, service_fn};
use serde_json::{Value, json};

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    lambda::init(APP_NAME, module_path!(), false).await?;

    let fcm = Arc::new(FcmClient::from_env().await?);
    let func = service_fn(move |event| {
        let fcm = Arc::clone(&fcm);
        async move { handler(event, &fcm).await }
    });
    lambda_runtime::run(func).await?;
    Ok(())
}

async fn handler(
    event: LambdaEvent<TriggerPayload>,
    fcm: &FcmClient,
) -> Result<Value, lambda_runtime::Error> {
    let event = ChangeEvent::from(event.payload);
    bookingnotify::handle(&event, fcm).await;

    Ok(json!(null))
}
