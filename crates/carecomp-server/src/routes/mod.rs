pub mod assignments;
pub mod competencies;
pub mod contact;
pub mod dashboard;
pub mod deficiencies;
pub mod drills;
pub mod facilities;
pub mod org;
pub mod policies;
pub mod staff;
pub mod tracks;
