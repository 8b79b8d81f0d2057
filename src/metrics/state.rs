use std::cmp::Ordering;
use std::fmt;

/// Where a run currently stands.
///
/// Progress states are ordered along the happy path; failure states are
/// terminal and are not comparable with each other or with
/// [`ActionState::FinalAdjustSuccess`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionState {
    Init,
    Funded,
    InitialAdjustSuccess,
    SwapSimSuccess,
    FeesCollectOnlySuccess,
    FeesCollectOnlyFailed,
    ReFunded,
    FinalAdjustSuccess,
    SetupFailed,
    ApiFailed,
    FundingFailed,
    TxReverted,
    SwapSimFailed,
    UnexpectedError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Progress,
    Success,
    Failure,
}

impl ActionState {
    pub const ALL: [ActionState; 14] = [
        Self::Init,
        Self::Funded,
        Self::InitialAdjustSuccess,
        Self::SwapSimSuccess,
        Self::FeesCollectOnlySuccess,
        Self::FeesCollectOnlyFailed,
        Self::ReFunded,
        Self::FinalAdjustSuccess,
        Self::SetupFailed,
        Self::ApiFailed,
        Self::FundingFailed,
        Self::TxReverted,
        Self::SwapSimFailed,
        Self::UnexpectedError,
    ];

    pub const fn kind(self) -> StateKind {
        match self {
            Self::Init
            | Self::Funded
            | Self::InitialAdjustSuccess
            | Self::SwapSimSuccess
            | Self::FeesCollectOnlySuccess
            | Self::FeesCollectOnlyFailed
            | Self::ReFunded => StateKind::Progress,
            Self::FinalAdjustSuccess => StateKind::Success,
            Self::SetupFailed
            | Self::ApiFailed
            | Self::FundingFailed
            | Self::TxReverted
            | Self::SwapSimFailed
            | Self::UnexpectedError => StateKind::Failure,
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self.kind(), StateKind::Progress)
    }

    pub const fn is_failure(self) -> bool {
        matches!(self.kind(), StateKind::Failure)
    }

    /// Position along the happy path. The two fee-collection outcomes share a slot.
    const fn progress_rank(self) -> Option<u8> {
        match self {
            Self::Init => Some(0),
            Self::Funded => Some(1),
            Self::InitialAdjustSuccess => Some(2),
            Self::SwapSimSuccess => Some(3),
            Self::FeesCollectOnlySuccess | Self::FeesCollectOnlyFailed => Some(4),
            Self::ReFunded => Some(5),
            Self::FinalAdjustSuccess => Some(6),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Funded => "funded",
            Self::InitialAdjustSuccess => "initial_adjust_success",
            Self::SwapSimSuccess => "swap_sim_success",
            Self::FeesCollectOnlySuccess => "fees_collect_only_success",
            Self::FeesCollectOnlyFailed => "fees_collect_only_failed",
            Self::ReFunded => "re_funded",
            Self::FinalAdjustSuccess => "final_adjust_success",
            Self::SetupFailed => "setup_failed",
            Self::ApiFailed => "api_failed",
            Self::FundingFailed => "funding_failed",
            Self::TxReverted => "tx_reverted",
            Self::SwapSimFailed => "swap_sim_failed",
            Self::UnexpectedError => "unexpected_error",
        }
    }

    /// Whether a run in `self` may move to `next`.
    ///
    /// Progress only moves forward. Any progress state may fail. A terminal
    /// state is final, except that the generic `UnexpectedError` may be
    /// replaced by a specific failure.
    pub fn can_transition_to(self, next: ActionState) -> bool {
        match (self.kind(), next.kind()) {
            (StateKind::Progress, StateKind::Failure) => true,
            (StateKind::Progress, _) => self < next,
            (StateKind::Failure, StateKind::Failure) => {
                self == Self::UnexpectedError && next != Self::UnexpectedError
            }
            _ => false,
        }
    }
}

impl PartialOrd for ActionState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            return Some(Ordering::Equal);
        }
        match (self.progress_rank(), other.progress_rank()) {
            (Some(a), Some(b)) if a != b => Some(a.cmp(&b)),
            (Some(_), Some(_)) => None,
            // Failures sit after every non-terminal state.
            (None, Some(_)) if !other.is_terminal() => Some(Ordering::Greater),
            (Some(_), None) if !self.is_terminal() => Some(Ordering::Less),
            _ => None,
        }
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
