use std::cmp::Ordering;

use sqlx::PgExecutor;
use uuid::Uuid;

use crate::db::agent_repo;
use crate::models::AgentCandidate;

use super::DepositError;

/// Primary accounts outrank verified ones.
pub fn score(candidate: &AgentCandidate) -> u8 {
    2 * candidate.is_primary as u8 + candidate.is_verified as u8
}

fn in_region(candidate: &AgentCandidate, region: &str) -> bool {
    candidate
        .region
        .as_deref()
        .is_some_and(|r| r.trim().eq_ignore_ascii_case(region.trim()))
}

/// Total order over candidates, best first.
fn rank(a: &AgentCandidate, b: &AgentCandidate) -> Ordering {
    score(b)
        .cmp(&score(a))
        .then_with(|| b.available_balance.cmp(&a.available_balance))
        .then_with(|| a.strikes.cmp(&b.strikes))
        .then_with(|| a.agent_id.cmp(&b.agent_id))
        .then_with(|| a.account_id.cmp(&b.account_id))
}

/// Pick the best (agent, account) pair for a funding request.
///
/// Excluded agents are dropped first. Candidates in the user's region are
/// preferred; when none are left there, every region is considered. The
/// ranking is a total order, so the same candidate set always yields the
/// same pair.
pub fn select_agent(
    candidates: &[AgentCandidate],
    method: &str,
    user_region: Option<&str>,
    excluded: &[Uuid],
) -> Result<AgentCandidate, DepositError> {
    let eligible: Vec<&AgentCandidate> = candidates
        .iter()
        .filter(|c| !excluded.contains(&c.agent_id))
        .collect();

    let regional: Vec<&AgentCandidate> = match user_region {
        Some(region) => eligible
            .iter()
            .copied()
            .filter(|c| in_region(c, region))
            .collect(),
        None => Vec::new(),
    };
    let pool = if regional.is_empty() { eligible } else { regional };

    pool.into_iter()
        .min_by(|a, b| rank(a, b))
        .cloned()
        .ok_or_else(|| DepositError::NoAgentAvailable(method.to_string()))
}

/// Fetch candidates for a payment method and select one.
pub async fn find_agent(
    db: impl PgExecutor<'_>,
    method: &str,
    user_region: Option<&str>,
    excluded: &[Uuid],
) -> Result<AgentCandidate, DepositError> {
    let candidates = agent_repo::get_candidates(db, method).await?;
    let chosen = select_agent(&candidates, method, user_region, excluded)?;

    tracing::debug!(
        method,
        candidates = candidates.len(),
        agent_id = %chosen.agent_id,
        account_id = %chosen.account_id,
        score = score(&chosen),
        "Agent selected"
    );
    Ok(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn candidate(region: &str, primary: bool, verified: bool, balance: i64) -> AgentCandidate {
        AgentCandidate {
            agent_id: Uuid::new_v4(),
            agent_user_id: Uuid::new_v4(),
            agent_name: "agent".into(),
            region: Some(region.into()),
            available_balance: Decimal::from(balance),
            strikes: 0,
            account_id: Uuid::new_v4(),
            method: "mobile_money".into(),
            account_name: "Agent".into(),
            account_number: "0700000000".into(),
            is_primary: primary,
            is_verified: verified,
        }
    }

    #[test]
    fn test_primary_beats_verified_regardless_of_balance() {
        let primary = candidate("Dakar", true, false, 10);
        let verified = candidate("Dakar", false, true, 1_000_000);

        let chosen = select_agent(
            &[verified.clone(), primary.clone()],
            "mobile_money",
            Some("Dakar"),
            &[],
        )
        .unwrap();
        assert_eq!(chosen.agent_id, primary.agent_id);

        let chosen = select_agent(&[primary.clone(), verified], "mobile_money", Some("Dakar"), &[])
            .unwrap();
        assert_eq!(chosen.agent_id, primary.agent_id);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let mut pool: Vec<AgentCandidate> =
            (0..6).map(|_| candidate("Abidjan", true, true, 500)).collect();
        let first = select_agent(&pool, "mobile_money", Some("Abidjan"), &[]).unwrap();

        pool.reverse();
        let again = select_agent(&pool, "mobile_money", Some("Abidjan"), &[]).unwrap();
        assert_eq!(first, again);
        assert_eq!(first.agent_id, pool.iter().map(|c| c.agent_id).min().unwrap());
    }

    #[test]
    fn test_balance_then_strikes_break_ties() {
        let rich = candidate("Lome", true, true, 900);
        let poor = candidate("Lome", true, true, 100);
        let chosen = select_agent(&[poor, rich.clone()], "mobile_money", Some("Lome"), &[]).unwrap();
        assert_eq!(chosen.agent_id, rich.agent_id);

        let mut clean = candidate("Lome", true, true, 500);
        let mut penalised = candidate("Lome", true, true, 500);
        clean.strikes = 0;
        penalised.strikes = 3;
        let chosen = select_agent(&[penalised, clean.clone()], "mobile_money", Some("Lome"), &[])
            .unwrap();
        assert_eq!(chosen.agent_id, clean.agent_id);
    }

    #[test]
    fn test_prefers_region_then_falls_back() {
        let local = candidate("Accra", false, false, 10);
        let remote = candidate("Lagos", true, true, 10_000);

        let chosen =
            select_agent(&[remote.clone(), local.clone()], "mobile_money", Some("accra"), &[]).unwrap();
        assert_eq!(chosen.agent_id, local.agent_id);

        let chosen = select_agent(&[remote.clone(), local], "mobile_money", Some("Nairobi"), &[]).unwrap();
        assert_eq!(chosen.agent_id, remote.agent_id);
    }

    #[test]
    fn test_exclusion_and_empty_pool() {
        let a = candidate("Accra", true, true, 10);
        let b = candidate("Accra", false, false, 10);

        let chosen = select_agent(&[a.clone(), b.clone()], "mobile_money", Some("Accra"), &[a.agent_id])
            .unwrap();
        assert_eq!(chosen.agent_id, b.agent_id);

        let err = select_agent(&[a.clone(), b.clone()], "mobile_money", None, &[a.agent_id, b.agent_id])
            .unwrap_err();
        assert!(matches!(err, DepositError::NoAgentAvailable(_)));

        let err = select_agent(&[], "bank", Some("Accra"), &[]).unwrap_err();
        assert!(matches!(err, DepositError::NoAgentAvailable(m) if m == "bank"));
    }
}
