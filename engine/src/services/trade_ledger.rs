// Simulated binary-option fills against the live price
use chrono::{DateTime, Utc};
use shared::models::{Instrument, OptionKind, TradeOutcome, TradeRecord};
use shared::utils::time_label;
use uuid::Uuid;

use crate::data::generator::RandomSource;

/// A draw above this wins.
const WIN_THRESHOLD: f64 = 0.38;
const WIN_PAYOUT: f64 = 88.0;
const LOSS_PAYOUT: f64 = -100.0;
const MIN_MOVE_STEPS: f64 = 5.0;
const EXTRA_MOVE_STEPS: f64 = 15.0;

/// Settles one option at `entry_price`. The outcome is drawn first, then the
/// size of the exit move in instrument steps.
pub fn simulate_trade(
    instrument: &Instrument,
    kind: OptionKind,
    entry_price: f64,
    signal_id: Option<String>,
    rng: &mut dyn RandomSource,
    now: DateTime<Utc>,
) -> TradeRecord {
    let won = rng.next_unit() > WIN_THRESHOLD;
    let diff = instrument.step_size * (MIN_MOVE_STEPS + rng.next_unit() * EXTRA_MOVE_STEPS);

    let favourable = match kind {
        OptionKind::Call => diff,
        OptionKind::Put => -diff,
    };
    let exit_price = if won { entry_price + favourable } else { entry_price - favourable };

    let record = TradeRecord {
        id: Uuid::new_v4().to_string(),
        asset: instrument.id.clone(),
        kind,
        entry_price,
        exit_price,
        timestamp: time_label(now),
        outcome: if won { TradeOutcome::Won } else { TradeOutcome::Lost },
        profit: if won { WIN_PAYOUT } else { LOSS_PAYOUT },
        signal_id,
    };

    tracing::info!(
        asset = %record.asset,
        kind = ?record.kind,
        entry = record.entry_price,
        exit = record.exit_price,
        outcome = ?record.outcome,
        "Simulated trade settled"
    );
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::catalog::Catalog;
    use crate::data::generator::test_support::SequenceSource;

    fn create_instrument() -> Instrument {
        Catalog::builtin().instrument("EURUSD").unwrap().clone()
    }

    #[test]
    fn test_winning_call_moves_up() {
        let instrument = create_instrument();
        let mut rng = SequenceSource::new(vec![0.9, 0.0]);
        let trade = simulate_trade(&instrument, OptionKind::Call, 1.0, Some("sig".to_string()), &mut rng, Utc::now());

        assert_eq!(trade.outcome, TradeOutcome::Won);
        assert_eq!(trade.profit, 88.0);
        assert!((trade.exit_price - (1.0 + 0.00015 * 5.0)).abs() < 1e-12);
        assert_eq!(trade.signal_id.as_deref(), Some("sig"));
        assert_eq!(trade.asset, "EURUSD");
    }

    #[test]
    fn test_losing_put_moves_up() {
        let instrument = create_instrument();
        let mut rng = SequenceSource::new(vec![0.38, 1.0]);
        let trade = simulate_trade(&instrument, OptionKind::Put, 1.0, None, &mut rng, Utc::now());

        assert_eq!(trade.outcome, TradeOutcome::Lost);
        assert_eq!(trade.profit, -100.0);
        assert!((trade.exit_price - (1.0 + 0.00015 * 20.0)).abs() < 1e-12);
    }

    #[test]
    fn test_winning_put_and_losing_call_move_down() {
        let instrument = create_instrument();
        let won_put = simulate_trade(&instrument, OptionKind::Put, 1.0, None, &mut SequenceSource::new(vec![0.5, 0.0]), Utc::now());
        let lost_call = simulate_trade(&instrument, OptionKind::Call, 1.0, None, &mut SequenceSource::new(vec![0.1, 0.0]), Utc::now());
        assert!(won_put.exit_price < 1.0);
        assert!(lost_call.exit_price < 1.0);
        assert_eq!(lost_call.outcome, TradeOutcome::Lost);
    }
}
