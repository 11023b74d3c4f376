use std::collections::HashMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::ObligationStatus;

/// The fields of an unpaid obligation the reconciliation planner needs.
/// Callers must only feed rows with no payment date; paid rows are never
/// touched by reconciliation.
#[derive(Debug, Clone)]
pub struct ObligationSnapshot {
    pub id: Uuid,
    pub policy_id: Uuid,
    pub due_date: NaiveDate,
    pub status: ObligationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub id: Uuid,
    pub status: ObligationStatus,
}

/// Re-derive every unpaid obligation's status from `today`, in three
/// passes run back to back:
///
/// 1. anything due before today still in Pending/Upcoming/Partially Paid
///    goes Overdue;
/// 2. every future-or-present-due Pending row is demoted to Upcoming;
/// 3. per policy, the earliest future-or-present-due Pending/Upcoming
///    row is promoted back to Pending and every other
///    future-or-present-due row is set Upcoming.
///
/// Pass 2 must precede pass 3 so the promotion in pass 3 starts from a
/// clean slate. The whole pass is idempotent: planning again over the
/// applied result yields no changes.
pub fn plan_transitions(rows: &[ObligationSnapshot], today: NaiveDate) -> Vec<StatusChange> {
    let mut next: Vec<ObligationStatus> = rows.iter().map(|row| row.status).collect();

    for (i, row) in rows.iter().enumerate() {
        if row.due_date < today
            && matches!(
                next[i],
                ObligationStatus::Pending
                    | ObligationStatus::Upcoming
                    | ObligationStatus::PartiallyPaid
            )
        {
            next[i] = ObligationStatus::Overdue;
        }
    }

    for (i, row) in rows.iter().enumerate() {
        if row.due_date >= today && next[i] == ObligationStatus::Pending {
            next[i] = ObligationStatus::Upcoming;
        }
    }

    let mut by_policy: HashMap<Uuid, Vec<usize>> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        if row.due_date >= today {
            by_policy.entry(row.policy_id).or_default().push(i);
        }
    }

    for indices in by_policy.values() {
        let winner = indices
            .iter()
            .copied()
            .filter(|&i| {
                matches!(
                    next[i],
                    ObligationStatus::Pending | ObligationStatus::Upcoming
                )
            })
            .min_by_key(|&i| rows[i].due_date);

        if let Some(winner) = winner {
            for &i in indices {
                next[i] = if i == winner {
                    ObligationStatus::Pending
                } else {
                    ObligationStatus::Upcoming
                };
            }
        }
    }

    rows.iter()
        .enumerate()
        .filter(|(i, row)| next[*i] != row.status)
        .map(|(i, row)| StatusChange {
            id: row.id,
            status: next[i],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn snapshot(
        policy_id: Uuid,
        due: NaiveDate,
        status: ObligationStatus,
    ) -> ObligationSnapshot {
        ObligationSnapshot {
            id: Uuid::new_v4(),
            policy_id,
            due_date: due,
            status,
        }
    }

    fn apply(rows: &mut [ObligationSnapshot], changes: &[StatusChange]) {
        for change in changes {
            let row = rows.iter_mut().find(|r| r.id == change.id).unwrap();
            row.status = change.status;
        }
    }

    #[test]
    fn elapsed_rows_become_overdue() {
        let policy = Uuid::new_v4();
        let rows = vec![
            snapshot(policy, d(2024, 2, 15), ObligationStatus::Pending),
            snapshot(policy, d(2024, 3, 1), ObligationStatus::Upcoming),
            snapshot(policy, d(2024, 2, 16), ObligationStatus::PartiallyPaid),
        ];
        let changes = plan_transitions(&rows, d(2024, 4, 1));

        assert_eq!(changes.len(), 3);
        assert!(
            changes
                .iter()
                .all(|c| c.status == ObligationStatus::Overdue)
        );
    }

    #[test]
    fn overdue_rows_are_never_promoted_back() {
        let policy = Uuid::new_v4();
        let rows = vec![snapshot(policy, d(2024, 2, 15), ObligationStatus::Overdue)];
        assert!(plan_transitions(&rows, d(2024, 4, 1)).is_empty());
    }

    #[test]
    fn exactly_one_pending_per_policy() {
        let policy_a = Uuid::new_v4();
        let policy_b = Uuid::new_v4();
        let today = d(2024, 2, 1);
        let mut rows = vec![
            snapshot(policy_a, d(2024, 3, 15), ObligationStatus::Upcoming),
            snapshot(policy_a, d(2024, 2, 15), ObligationStatus::Upcoming),
            snapshot(policy_a, d(2024, 4, 15), ObligationStatus::Upcoming),
            snapshot(policy_b, d(2024, 2, 20), ObligationStatus::Upcoming),
        ];

        let changes = plan_transitions(&rows, today);
        apply(&mut rows, &changes);

        for policy in [policy_a, policy_b] {
            let pending: Vec<_> = rows
                .iter()
                .filter(|r| r.policy_id == policy && r.status == ObligationStatus::Pending)
                .collect();
            assert_eq!(pending.len(), 1, "policy should hold exactly one Pending");
        }
        // The earliest due date wins.
        assert_eq!(
            rows.iter()
                .find(|r| r.status == ObligationStatus::Pending && r.policy_id == policy_a)
                .unwrap()
                .due_date,
            d(2024, 2, 15)
        );
    }

    #[test]
    fn stale_pending_is_demoted_when_an_earlier_row_appears() {
        let policy = Uuid::new_v4();
        let mut rows = vec![
            snapshot(policy, d(2024, 3, 15), ObligationStatus::Pending),
            // e.g. the remainder of a partial payment, due sooner
            snapshot(policy, d(2024, 2, 16), ObligationStatus::Upcoming),
        ];

        let changes = plan_transitions(&rows, d(2024, 2, 1));
        apply(&mut rows, &changes);

        assert_eq!(rows[0].status, ObligationStatus::Upcoming);
        assert_eq!(rows[1].status, ObligationStatus::Pending);
    }

    #[test]
    fn reconciliation_is_idempotent() {
        let policy = Uuid::new_v4();
        let today = d(2024, 3, 1);
        let mut rows = vec![
            snapshot(policy, d(2024, 2, 15), ObligationStatus::Pending),
            snapshot(policy, d(2024, 3, 15), ObligationStatus::Pending),
            snapshot(policy, d(2024, 4, 15), ObligationStatus::Upcoming),
        ];

        let changes = plan_transitions(&rows, today);
        apply(&mut rows, &changes);
        assert!(
            plan_transitions(&rows, today).is_empty(),
            "second pass with no time elapsed must be a no-op"
        );
    }

    #[test]
    fn policy_with_only_elapsed_rows_gets_no_pending() {
        let policy = Uuid::new_v4();
        let mut rows = vec![
            snapshot(policy, d(2024, 1, 15), ObligationStatus::Pending),
            snapshot(policy, d(2024, 2, 15), ObligationStatus::Upcoming),
        ];

        let changes = plan_transitions(&rows, d(2024, 3, 1));
        apply(&mut rows, &changes);

        assert!(
            rows.iter()
                .all(|r| r.status == ObligationStatus::Overdue)
        );
    }

    #[test]
    fn due_today_counts_as_current_not_overdue() {
        let policy = Uuid::new_v4();
        let today = d(2024, 2, 15);
        let mut rows = vec![
            snapshot(policy, today, ObligationStatus::Upcoming),
            snapshot(policy, d(2024, 3, 15), ObligationStatus::Upcoming),
        ];

        let changes = plan_transitions(&rows, today);
        apply(&mut rows, &changes);

        assert_eq!(rows[0].status, ObligationStatus::Pending);
        assert_eq!(rows[1].status, ObligationStatus::Upcoming);
    }
}
