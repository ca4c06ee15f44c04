#[cfg(test)]
mod tests {
    use crate::admission::{AdmissionController, AdmissionVerdict, LedgerView};
    use crate::eviction::Candidate;
    use crate::types::Priority;

    fn candidate(owner: &str, amount: u64, last_used: u64, seq: u64) -> Candidate {
        Candidate {
            collaborator: owner.to_string(),
            resource: "model".to_string(),
            amount,
            priority: Priority::Medium,
            last_used,
            seq,
        }
    }

    #[test]
    fn test_admit_without_evictions_when_headroom_suffices() {
        let view = LedgerView { limit: 60, used: 50 };
        let leases = vec![candidate("svc-a", 20, 1, 0), candidate("svc-b", 30, 2, 1)];

        let verdict = AdmissionController::decide(view, "svc-c", 10, &leases);
        assert_eq!(
            verdict,
            AdmissionVerdict::Admit {
                victims: vec![],
                freed: 0
            }
        );
    }

    #[test]
    fn test_admit_evicts_only_the_deficit() {
        // 64 total, 4 reserve, 50 used -> 10 available, 15 requested
        let view = LedgerView { limit: 60, used: 50 };
        let leases = vec![candidate("svc-a", 20, 1, 0), candidate("svc-b", 30, 2, 1)];

        match AdmissionController::decide(view, "svc-c", 15, &leases) {
            AdmissionVerdict::Admit { victims, freed } => {
                assert_eq!(victims.len(), 1);
                assert_eq!(victims[0].collaborator, "svc-a");
                assert_eq!(freed, 20);
            }
            other => panic!("Expected Admit, got {:?}", other),
        }
    }

    #[test]
    fn test_reject_reports_what_could_be_freed() {
        let view = LedgerView { limit: 60, used: 50 };
        let leases = vec![candidate("svc-a", 20, 1, 0), candidate("svc-b", 30, 2, 1)];

        let verdict = AdmissionController::decide(view, "svc-b", 40, &leases);
        assert_eq!(
            verdict,
            AdmissionVerdict::Reject {
                requested: 40,
                available: 10,
                deficit: 30,
                obtainable: 20,
            }
        );
    }

    #[test]
    fn test_overcommitted_view_has_no_headroom() {
        let view = LedgerView { limit: 10, used: 25 };
        assert_eq!(view.available(), 0);
    }
}
