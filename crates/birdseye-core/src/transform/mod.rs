pub mod composite;
pub mod rectify;
