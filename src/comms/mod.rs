pub mod webhook_api;
