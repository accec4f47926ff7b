use alloy::{contract::Error as ContractError, transports::RpcError};

/// Bubbles up node errors, turning every other error into `None`.
///
/// A contract that reverts (not deployed at the queried block, doesn't
/// implement the method, ...) simply has no output, while a failing node
/// makes the result unusable.
pub fn ignore_non_node_error<T>(result: Result<T, ContractError>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(result) => Ok(Some(result)),
        Err(err) if err.is_node_error() => Err(err.into()),
        Err(err) => {
            tracing::trace!(?err, "ignoring contract error");
            Ok(None)
        }
    }
}

pub trait ContractErrorExt {
    /// Returns whether a given error is a contract error, this is considered to
    /// be all errors except the transport error where there is no revert data.
    fn is_contract_error(&self) -> bool;

    /// Returns whether a given error is a node error.
    fn is_node_error(&self) -> bool;
}

impl ContractErrorExt for ContractError {
    fn is_contract_error(&self) -> bool {
        !self.is_node_error()
    }

    fn is_node_error(&self) -> bool {
        // Reverts surface as JSON-RPC error responses carrying revert data.
        // Calls to methods a contract doesn't have revert with *empty* data,
        // so the presence of revert data is checked rather than decoded.
        match self {
            ContractError::TransportError(RpcError::ErrorResp(err)) => {
                err.as_revert_data().is_none()
            }
            ContractError::TransportError(_) => true,
            _ => false,
        }
    }
}
