mod cache_test;
mod config_test;
