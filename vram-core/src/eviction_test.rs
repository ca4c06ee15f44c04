#[cfg(test)]
mod tests {
    use crate::eviction::{Candidate, EvictionPolicy};
    use crate::types::Priority;

    const MINUTE: u64 = 60_000;

    fn candidate(owner: &str, amount: u64, priority: Priority, last_used: u64, seq: u64) -> Candidate {
        Candidate {
            collaborator: owner.to_string(),
            resource: format!("{}-model", owner),
            amount,
            priority,
            last_used,
            seq,
        }
    }

    fn owners(victims: &[Candidate]) -> Vec<&str> {
        victims.iter().map(|v| v.collaborator.as_str()).collect()
    }

    #[test]
    fn test_oldest_first_within_tier() {
        let now = 200 * MINUTE;
        // A idle 60 minutes, B idle 120 minutes
        let leases = vec![
            candidate("a", 20, Priority::Low, now - 60 * MINUTE, 0),
            candidate("b", 30, Priority::Low, now - 120 * MINUTE, 1),
        ];

        let victims = EvictionPolicy::select_victims(&leases, Some("c"), 25);
        assert_eq!(owners(&victims), vec!["b"]);
    }

    #[test]
    fn test_minimal_prefix_when_oldest_is_too_small() {
        let now = 200 * MINUTE;
        let leases = vec![
            candidate("a", 20, Priority::Low, now - 60 * MINUTE, 0),
            candidate("b", 30, Priority::Low, now - 120 * MINUTE, 1),
            candidate("d", 40, Priority::Low, now - 10 * MINUTE, 2),
        ];

        let victims = EvictionPolicy::select_victims(&leases, None, 45);
        assert_eq!(owners(&victims), vec!["b", "a"]);
        assert_eq!(EvictionPolicy::total(&victims), 50);
    }

    #[test]
    fn test_low_tier_sacrificed_before_high_regardless_of_recency() {
        let leases = vec![
            candidate("a", 20, Priority::High, 1_000, 0),
            candidate("b", 20, Priority::Low, 1_000, 1),
        ];
        let victims = EvictionPolicy::select_victims(&leases, None, 20);
        assert_eq!(owners(&victims), vec!["b"]);

        // Even a much fresher low lease goes before a stale high one
        let leases = vec![
            candidate("a", 20, Priority::High, 10, 0),
            candidate("b", 20, Priority::Low, 9_000_000, 1),
        ];
        let victims = EvictionPolicy::select_victims(&leases, None, 20);
        assert_eq!(owners(&victims), vec!["b"]);
    }

    #[test]
    fn test_ties_follow_insertion_order() {
        let leases = vec![
            candidate("late", 10, Priority::Medium, 500, 7),
            candidate("early", 10, Priority::Medium, 500, 3),
        ];
        let ranked = EvictionPolicy::rank(&leases, None);
        assert_eq!(owners(&ranked), vec!["early", "late"]);
    }

    #[test]
    fn test_excluded_and_empty_leases_are_never_victims() {
        let leases = vec![
            candidate("self", 50, Priority::Low, 0, 0),
            candidate("zero", 0, Priority::Low, 0, 1),
            candidate("other", 10, Priority::High, 0, 2),
        ];
        let victims = EvictionPolicy::select_victims(&leases, Some("self"), 100);
        assert_eq!(owners(&victims), vec!["other"]);
        assert_eq!(EvictionPolicy::total(&victims), 10);
    }

    #[test]
    fn test_nothing_selected_for_zero_amount() {
        let leases = vec![candidate("a", 10, Priority::Low, 0, 0)];
        assert!(EvictionPolicy::select_victims(&leases, None, 0).is_empty());
    }
}
