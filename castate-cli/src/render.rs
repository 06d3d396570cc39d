//! Console rendering of adapter records

use castate::traits::BalanceSnapshot;
use castate::{AllowanceView, EventOutcome, IntentView, ProgressState};

pub fn balance(snapshot: Option<&BalanceSnapshot>) {
    let Some(snapshot) = snapshot else {
        println!("  (no balance fetched)");
        return;
    };
    for asset in &snapshot.assets {
        println!(
            "  {:<6} {:>14}  ${:>10.2}  on {} chain(s)",
            asset.symbol,
            asset.balance,
            asset.balance_in_fiat,
            asset.breakdown.len()
        );
    }
    println!("  {:<6} {:>14}  ${:>10.2}", "total", "", snapshot.total_fiat());
}

pub fn allowance(view: &AllowanceView) {
    for (i, source) in view.sources.iter().enumerate() {
        let choice = view
            .choices
            .get(i)
            .or(view.choices.first())
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {} on {} ({}): min {} current {} -> {}",
            source.token.symbol,
            source.chain_name,
            source.chain_id,
            source.min_allowance,
            source.current_allowance,
            choice
        );
    }
}

pub fn intent(view: &IntentView) {
    let Some(intent) = &view.intent else {
        println!("  (no intent)");
        return;
    };
    if view.sources_open {
        for source in &intent.sources {
            println!("  from {:<14} {} {}", source.chain_name, source.amount, intent.token.symbol);
        }
    }
    println!(
        "  to   {:<14} {} {}",
        intent.destination.chain_name, intent.destination.amount, intent.token.symbol
    );
    if view.fees_open {
        let fees = &intent.fees;
        println!(
            "  fees: gas {} protocol {} solver {} supplied {}",
            fees.ca_gas, fees.protocol, fees.solver, fees.gas_supplied
        );
    }
    println!("  total fees {}", intent.fees.total);
}

pub fn progress(state: &ProgressState) {
    for tracked in &state.steps {
        let mark = if tracked.done { "x" } else { " " };
        println!("  [{}] {} ({})", mark, tracked.step.kind, tracked.step.type_id);
    }
    println!(
        "  in progress: {}  completed: {}",
        state.in_progress, state.completed
    );
}

pub fn outcome(outcome: &EventOutcome) {
    match outcome {
        EventOutcome::StepsExpected { count } => println!("  expecting {} steps", count),
        EventOutcome::StepCompleted { type_id, index, all_done } => {
            println!("  step {} ({}) done{}", index, type_id, if *all_done { ", all done" } else { "" })
        }
        EventOutcome::Unmatched { type_id } => println!("  no tracked step {}", type_id),
    }
}
