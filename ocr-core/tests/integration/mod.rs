mod config_sync;
mod mock_chain;
mod node_lifecycle;
mod protocol_flow;
mod storage_persistence;
mod transport_mock;
mod transmitter;
