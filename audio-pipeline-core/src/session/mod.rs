pub mod context_provider;
pub mod controller;
pub mod dispatcher;
pub mod validator;
