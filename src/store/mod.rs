pub mod token_registry;
