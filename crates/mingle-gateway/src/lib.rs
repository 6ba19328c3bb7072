pub mod dispatcher;
pub mod push;
pub mod relay;
