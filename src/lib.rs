pub mod config;

#[cfg(test)]
pub mod test_server;


// CORE
pub mod core {
    pub mod auth {
        pub mod client_claims;
        pub mod credentials;
        pub mod identity;
    }
    pub mod protocol {
        pub mod error;
        pub mod client {
            pub mod connection;
            pub mod events;
            mod handlers;
            pub mod session;
            pub mod transport;
        }
        pub mod crypto {
            pub mod encryptor;
            pub mod cipher {
                pub mod checksum;
                pub mod stream_cipher;
            }
            pub mod handshake {
                pub mod handshake;
            }
            pub mod key_manager {
                pub mod key_exchange;
                pub mod session_keys;
            }
            pub mod signature {
                pub mod token;
            }
        }
        pub mod packets {
            pub mod compression;
            pub mod header;
            pub mod registry;
            pub mod stream;
            pub mod decoder {
                pub mod frame_reader;
            }
            pub mod encoder {
                pub mod frame_writer;
            }
            pub mod game {
                pub mod handshake;
                pub mod packet;
                pub mod resource_packs;
                pub mod world;
            }
            pub mod processor {
                pub mod dispatcher;
                pub mod priority;
                pub mod packet_service;
                pub mod pipeline {
                    pub mod orchestrator;
                    pub mod stages {
                        pub mod common;
                        pub mod decompression;
                        pub mod decryption;
                        pub mod unframe;
                    }
                }
            }
        }
    }
}

pub use config::ClientOptions;
pub use core::protocol::client::connection::Connection;
pub use core::protocol::client::events::ClientEvent;
pub use core::protocol::error::{ProtocolError, ProtocolResult};
