mod card;
mod course;
mod ids;
mod lesson;
mod word;

pub use ids::{CardId, CourseId, LessonId, ParseIdError, TeacherIdentity, WordId};

pub use card::{Card, CardError};
pub use course::{Course, CourseDraft, CourseError, CourseStatus};
pub use lesson::{Lesson, LessonError};
pub use word::{CardWord, Word, WordDraft, WordError};
