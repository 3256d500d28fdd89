pub mod reconcile_partial_assignments;
