use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GatewayKind {
  /// Fans out to every outgoing flow.
  ParallelGateway,
  /// Fans out to the outgoing flows whose condition holds.
  ExclusiveGateway,
  /// Merges the branches of one diverging gateway.
  ConvergeGateway,
}

impl GatewayKind {
  /// Whether this gateway opens branches that must later converge.
  pub fn is_diverging(self) -> bool {
    matches!(self, Self::ParallelGateway | Self::ExclusiveGateway)
  }

  pub fn is_converging(self) -> bool {
    matches!(self, Self::ConvergeGateway)
  }
}
