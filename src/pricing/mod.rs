pub mod predictor;
pub mod reconcile;
pub mod tick;

pub use predictor::{HttpPredictor, PredictorError, PricePredictor};
pub use reconcile::{reconcile, ReconcileError, ReconciledPrice};
pub use tick::{convert, CalculationError, TickConversion};
