pub mod altair;
pub mod attestation;
pub mod attestation_data;
pub mod attester_slashing;
pub mod beacon_block;
pub mod beacon_block_header;
pub mod beacon_state;
pub mod bellatrix;
pub mod checkpoint;
pub mod constants;
pub mod deposit;
pub mod deposit_data;
pub mod deposit_message;
pub mod eth_1_data;
pub mod execution_payload;
pub mod fork;
pub mod fork_data;
pub mod historical_batch;
pub mod indexed_attestation;
pub mod misc;
pub mod pending_attestation;
pub mod phase0;
pub mod preset;
pub mod proposer_slashing;
pub mod signing_data;
pub mod sync_committee;
pub mod validator;
pub mod view;
pub mod voluntary_exit;
