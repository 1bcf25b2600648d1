//! Property tests for jumping through history via navigation entries

use placemark_store::{
    Direction, Feature, FeatureId, FeaturePatch, Geometry, NavigationEntry, Session, SessionConfig,
    TransactRequest,
};
use proptest::prelude::*;

/// Apply `edits` as separate moments; each edit moves or creates one feature
async fn build(edits: &[(u8, i16)]) -> (Session, Vec<Vec<Feature>>) {
    let session = Session::new(SessionConfig::default()).unwrap();
    let mut states = vec![Vec::new()];

    for (i, (slot, x)) in edits.iter().enumerate() {
        let id = FeatureId::from(format!("f{}", slot));
        let geometry = Geometry::point(f64::from(*x), 0.0);
        let request = if session.read(&id).is_some() {
            TransactRequest::new(format!("edit {}", i)).update(id, FeaturePatch::new().with_geometry(geometry))
        } else {
            TransactRequest::new(format!("edit {}", i)).create([Feature::new(id, geometry)])
        };
        session.transact(request).await.unwrap();
        states.push(session.read_all());
    }
    (session, states)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Jumping to an undo entry lands on the state recorded before that moment,
    /// display order included, and jumping back through the matching redo
    /// entry restores the present
    #[test]
    fn prop_navigation_steps_land_on_recorded_states(
        edits in prop::collection::vec((0u8..4, -100i16..100), 1..12),
        pick in any::<prop::sample::Index>(),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let (session, states) = build(&edits).await;

            let nav = session.observe_moment_log().navigation();
            let undo_entries: Vec<usize> = nav
                .iter()
                .filter_map(|entry| match entry {
                    NavigationEntry::Moment { direction: Direction::Undo, steps, .. } => Some(*steps),
                    _ => None,
                })
                .collect();
            prop_assert_eq!(undo_entries.len(), edits.len());
            prop_assert_eq!(nav.iter().filter(|e| **e == NavigationEntry::Current).count(), 1);

            let steps = undo_entries[pick.index(undo_entries.len())];
            prop_assert_eq!(session.undo_steps(steps).await.unwrap(), steps);
            prop_assert_eq!(&session.read_all(), &states[edits.len() - steps]);

            // The redo side now lists exactly the undone moments, nearest first
            let redo_steps: Vec<usize> = session
                .observe_moment_log()
                .navigation()
                .iter()
                .filter_map(|entry| match entry {
                    NavigationEntry::Moment { direction: Direction::Redo, steps, .. } => Some(*steps),
                    _ => None,
                })
                .collect();
            prop_assert_eq!(redo_steps, (1..=steps).collect::<Vec<_>>());

            prop_assert_eq!(session.redo_steps(steps).await.unwrap(), steps);
            prop_assert_eq!(&session.read_all(), &states[edits.len()]);
            Ok(())
        })?;
    }
}
