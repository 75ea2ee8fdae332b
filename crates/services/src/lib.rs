#![forbid(unsafe_code)]

pub mod app_services;
pub mod browser;
pub mod card_service;
pub mod deck_service;
pub mod error;
pub mod lesson_service;
pub mod mutation;

pub use course_core::Clock;

pub use app_services::AppServices;
pub use browser::BrowserSession;
pub use card_service::CardService;
pub use deck_service::{CourseOverview, DeckService};
pub use error::{AppServicesError, BrowserError, DeckServiceError, MutationError};
pub use lesson_service::LessonService;
pub use mutation::{DispatchEvent, Mutation, MutationDispatcher, Ticket};
