pub mod valkey_cache;
