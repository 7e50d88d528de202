pub mod airly;
