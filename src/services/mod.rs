pub mod channel_repository;
pub mod m3u_parser;
pub mod player;
pub mod playlist_service;
pub mod use_cases;
pub mod xtream;
