pub mod resources;
pub mod run;
pub mod state;
pub mod validate;
