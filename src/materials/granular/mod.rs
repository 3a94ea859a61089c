pub mod sand;
