pub mod apply;
pub mod events;
pub mod pools;
pub mod run;
