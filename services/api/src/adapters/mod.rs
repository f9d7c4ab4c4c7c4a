pub mod db;

pub use db::PgSessionStore;
