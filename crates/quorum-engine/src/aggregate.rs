use std::cmp::Ordering;

use quorum_models::{AggregationMode, ParsedResponse, ParsedSignal, SignalType};
use rust_decimal::{Decimal, RoundingStrategy};

/// One usable response attributed to its provider.
#[derive(Debug, Clone)]
pub struct GroupMember {
    pub provider_id: String,
    pub signal: ParsedSignal,
}

/// All usable responses that voted for one signal type.
#[derive(Debug, Clone)]
pub struct VoteGroup {
    pub signal_type: SignalType,
    pub members: Vec<GroupMember>,
    pub mean_confidence: Decimal,
}

/// The winning vote group with its numeric fields averaged.
///
/// Fully deterministic for a fixed input list: grouping preserves
/// first-encountered order and ties are broken alphabetically by type name
/// (BUY < HOLD < SELL), never by completion order.
#[derive(Debug, Clone)]
pub struct Consensus {
    pub signal_type: SignalType,
    /// Rounded to an integer, members missing confidence counted as 50.
    pub confidence: Decimal,
    /// Mean over members that supplied the field, 0 when none did. 2 dp.
    pub price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub members: Vec<GroupMember>,
}

/// Confidence assumed for a usable member that did not report one.
fn member_confidence(signal: &ParsedSignal) -> Decimal {
    signal.confidence.unwrap_or_else(|| Decimal::from(50))
}

/// Reduce settled provider responses into one consensus, or `None` when no
/// provider produced a usable parsed signal.
pub fn aggregate(responses: &[ParsedResponse], mode: AggregationMode) -> Option<Consensus> {
    let usable: Vec<GroupMember> = responses
        .iter()
        .filter(|r| r.ok)
        .filter_map(|r| {
            r.parsed.as_ref().map(|signal| GroupMember {
                provider_id: r.provider_id.clone(),
                signal: signal.clone(),
            })
        })
        .collect();

    if usable.is_empty() {
        return None;
    }

    let groups = group_votes(&usable);
    let winner = match mode {
        AggregationMode::Majority => {
            pick_winner(&groups, |g| Decimal::from(g.members.len()))
        }
        AggregationMode::Weighted => pick_winner(&groups, |g| {
            Decimal::from(g.members.len()) * g.mean_confidence
        }),
        AggregationMode::First => {
            let first_type = usable[0].signal.signal_type.unwrap_or(SignalType::Hold);
            groups.iter().find(|g| g.signal_type == first_type)?
        }
    };

    Some(Consensus {
        signal_type: winner.signal_type,
        confidence: winner
            .mean_confidence
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
        price: mean_present(&winner.members, |s| s.price),
        stop_loss: mean_present(&winner.members, |s| s.stop_loss),
        take_profit: mean_present(&winner.members, |s| s.take_profit),
        members: winner.members.clone(),
    })
}

/// Group members by signal type (missing type votes HOLD), preserving
/// first-encountered key order.
fn group_votes(usable: &[GroupMember]) -> Vec<VoteGroup> {
    let mut groups: Vec<VoteGroup> = Vec::new();
    for member in usable {
        let signal_type = member.signal.signal_type.unwrap_or(SignalType::Hold);
        match groups.iter_mut().find(|g| g.signal_type == signal_type) {
            Some(group) => group.members.push(member.clone()),
            None => groups.push(VoteGroup {
                signal_type,
                members: vec![member.clone()],
                mean_confidence: Decimal::ZERO,
            }),
        }
    }
    for group in &mut groups {
        let sum: Decimal = group
            .members
            .iter()
            .map(|m| member_confidence(&m.signal))
            .sum();
        group.mean_confidence = sum / Decimal::from(group.members.len());
    }
    groups
}

/// Highest score wins; equal scores fall back to alphabetical type order.
fn pick_winner<'a>(
    groups: &'a [VoteGroup],
    score: impl Fn(&VoteGroup) -> Decimal,
) -> &'a VoteGroup {
    let mut best = &groups[0];
    for group in &groups[1..] {
        match score(group).cmp(&score(best)) {
            Ordering::Greater => best = group,
            Ordering::Equal => {
                if group.signal_type.as_str() < best.signal_type.as_str() {
                    best = group;
                }
            }
            Ordering::Less => {}
        }
    }
    best
}

/// Mean over the members that supplied the field; members without it are
/// excluded, not treated as zero. 0 when no member supplied it. 2 dp.
fn mean_present(
    members: &[GroupMember],
    field: impl Fn(&ParsedSignal) -> Option<Decimal>,
) -> Decimal {
    let values: Vec<Decimal> = members.iter().filter_map(|m| field(&m.signal)).collect();
    if values.is_empty() {
        return Decimal::ZERO;
    }
    let sum: Decimal = values.iter().copied().sum();
    (sum / Decimal::from(values.len()))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
