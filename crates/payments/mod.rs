pub mod payment_service_client;
