pub mod attendance;
pub mod event;
pub mod school;
pub mod student;
pub mod user;

pub use attendance::{AttendanceRecord, HistoricalAttendanceRecord};
pub use event::{Event, ScheduleSlot};
pub use school::School;
pub use student::Student;
pub use user::User;
