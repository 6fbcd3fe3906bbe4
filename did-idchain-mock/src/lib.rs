mod mock_adapter;
mod mock_id_chain;

pub use crate::{mock_adapter::MockAdapter, mock_id_chain::MockIDChain};
