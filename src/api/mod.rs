pub mod nordigen;
