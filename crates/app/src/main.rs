use std::fmt;
use std::fmt::Write as _;

use course_core::model::{CourseDraft, CourseId, CourseStatus, TeacherIdentity, WordDraft};
use course_core::{DeckTree, LessonNode};
use services::mutation::wait_for;
use services::{AppServices, BrowserSession, Clock, CourseOverview, DispatchEvent, Mutation};

mod logging;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    InvalidTeacher { raw: String },
    InvalidStatus { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidTeacher { raw } => write!(f, "invalid --teacher value: {raw:?}"),
            ArgsError::InvalidStatus { raw } => write!(
                f,
                "invalid --status value: {raw} (expected DRAFT, IN_REVIEW, APPROVED, PUBLISHED or ARCHIVED)"
            ),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn require_number<T: std::str::FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    let value = require_value(args, flag)?;
    value
        .trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw: value })
}

fn required<T>(value: Option<T>, flag: &'static str) -> Result<T, ArgsError> {
    value.ok_or(ArgsError::MissingFlag { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  author show          --course-id <id> [--lesson <order>] [--card <order>] [--json]");
    eprintln!("  author list");
    eprintln!("  author create-course --level <n> --title <text>");
    eprintln!("  author set-status    --course-id <id> --status <status>");
    eprintln!("  author add-word      --text <word> --definition <text> [--phonetic <text>] [--part-of-speech <text>]");
    eprintln!("  author add-lesson    --course-id <id> --title <text> [--order <order>]");
    eprintln!("  author rename-lesson --course-id <id> --order <order> --title <text>");
    eprintln!("  author delete-lesson --course-id <id> --order <order>");
    eprintln!("  author add-card      --course-id <id> --lesson <order> --text <text> [--order <order>]");
    eprintln!("  author edit-card     --course-id <id> --lesson <order> --order <order> --text <text>");
    eprintln!("  author delete-card   --course-id <id> --lesson <order> --order <order>");
    eprintln!("  author render        --text <text>");
    eprintln!();
    eprintln!("Common options:");
    eprintln!("  --db <sqlite_url>    default sqlite://authoring.sqlite3");
    eprintln!("  --teacher <username>");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  AUTHOR_DB_URL, AUTHOR_TEACHER, AUTHOR_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Show,
    List,
    CreateCourse,
    SetStatus,
    AddWord,
    AddLesson,
    RenameLesson,
    DeleteLesson,
    AddCard,
    EditCard,
    DeleteCard,
    Render,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "show" => Some(Self::Show),
            "list" => Some(Self::List),
            "create-course" => Some(Self::CreateCourse),
            "set-status" => Some(Self::SetStatus),
            "add-word" => Some(Self::AddWord),
            "add-lesson" => Some(Self::AddLesson),
            "rename-lesson" => Some(Self::RenameLesson),
            "delete-lesson" => Some(Self::DeleteLesson),
            "add-card" => Some(Self::AddCard),
            "edit-card" => Some(Self::EditCard),
            "delete-card" => Some(Self::DeleteCard),
            "render" => Some(Self::Render),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    db_url: String,
    teacher: Option<String>,
    course_id: Option<CourseId>,
    lesson: Option<u32>,
    order: Option<u32>,
    card: Option<u32>,
    level: Option<u32>,
    title: Option<String>,
    text: Option<String>,
    definition: Option<String>,
    phonetic: Option<String>,
    part_of_speech: Option<String>,
    status: Option<String>,
    json: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url: std::env::var("AUTHOR_DB_URL")
                .ok()
                .map_or_else(|| "sqlite://authoring.sqlite3".into(), normalize_sqlite_url),
            teacher: std::env::var("AUTHOR_TEACHER").ok(),
            ..Self::default()
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--teacher" => parsed.teacher = Some(require_value(args, "--teacher")?),
                "--course-id" => {
                    parsed.course_id = Some(CourseId::new(require_number(args, "--course-id")?));
                }
                "--lesson" => parsed.lesson = Some(require_number(args, "--lesson")?),
                "--order" => parsed.order = Some(require_number(args, "--order")?),
                "--card" => parsed.card = Some(require_number(args, "--card")?),
                "--level" => parsed.level = Some(require_number(args, "--level")?),
                "--title" => parsed.title = Some(require_value(args, "--title")?),
                "--text" => parsed.text = Some(require_value(args, "--text")?),
                "--definition" => parsed.definition = Some(require_value(args, "--definition")?),
                "--phonetic" => parsed.phonetic = Some(require_value(args, "--phonetic")?),
                "--part-of-speech" => {
                    parsed.part_of_speech = Some(require_value(args, "--part-of-speech")?);
                }
                "--status" => parsed.status = Some(require_value(args, "--status")?),
                "--json" => parsed.json = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    fn teacher(&self) -> Result<TeacherIdentity, ArgsError> {
        let raw = required(self.teacher.clone(), "--teacher")?;
        TeacherIdentity::new(raw.clone()).map_err(|_| ArgsError::InvalidTeacher { raw })
    }

    fn course_id(&self) -> Result<CourseId, ArgsError> {
        required(self.course_id, "--course-id")
    }

    fn status(&self) -> Result<CourseStatus, ArgsError> {
        let raw = required(self.status.clone(), "--status")?;
        raw.trim()
            .to_ascii_uppercase()
            .parse()
            .map_err(|_| ArgsError::InvalidStatus { raw })
    }

    /// Default `--order` of an insert to the next position in `tree`.
    fn fill_append_order(&mut self, cmd: Command, tree: &DeckTree) -> Result<(), ArgsError> {
        if self.order.is_some() {
            return Ok(());
        }
        self.order = match cmd {
            Command::AddLesson => Some(tree.next_lesson_order()),
            Command::AddCard => Some(
                tree.lesson(required(self.lesson, "--lesson")?)
                    .map_or(0, LessonNode::next_card_order),
            ),
            _ => None,
        };
        Ok(())
    }

    fn mutation(&self, cmd: Command) -> Result<Mutation, ArgsError> {
        let course_id = self.course_id()?;
        let title = || required(self.title.clone(), "--title");
        let text = || required(self.text.clone(), "--text");
        let order = || required(self.order, "--order");
        let lesson = || required(self.lesson, "--lesson");
        Ok(match cmd {
            Command::AddLesson => Mutation::AddLesson {
                course_id,
                order: order()?,
                title: title()?,
            },
            Command::RenameLesson => Mutation::RenameLesson {
                course_id,
                order: order()?,
                title: title()?,
            },
            Command::DeleteLesson => Mutation::DeleteLesson {
                course_id,
                order: order()?,
            },
            Command::AddCard => Mutation::AddCard {
                course_id,
                lesson_order: lesson()?,
                order: order()?,
                text: text()?,
            },
            Command::EditCard => Mutation::EditCard {
                course_id,
                lesson_order: lesson()?,
                order: order()?,
                text: text()?,
            },
            Command::DeleteCard => Mutation::DeleteCard {
                course_id,
                lesson_order: lesson()?,
                order: order()?,
            },
            Command::Show
            | Command::List
            | Command::CreateCourse
            | Command::SetStatus
            | Command::AddWord
            | Command::Render => return Err(ArgsError::UnknownArg(format!("{cmd:?}"))),
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") || raw.starts_with("sqlite:file:")
    {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Plain-text outline of a course with the current selection marked by `>`.
fn outline(session: &BrowserSession) -> String {
    let tree = session.tree();
    let state = session.state();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} (course {}, level {})",
        tree.course_title, tree.course_id, tree.course_level
    );
    for lesson in &tree.lessons {
        let lesson_selected = state.lesson == Some(lesson.order);
        let marker = if lesson_selected { ">" } else { " " };
        let _ = writeln!(out, "{marker} [{}] {}", lesson.order, lesson.title);
        for card in &lesson.cards {
            let marker = if lesson_selected && state.card == Some(card.order) {
                ">"
            } else {
                " "
            };
            let visible = course_core::strip(&card.text).unwrap_or_else(|_| card.text.clone());
            let _ = writeln!(out, "    {marker} ({}) {visible}", card.order);
            for word in &card.annotations {
                let _ = writeln!(
                    out,
                    "          {}..{} {}: {}",
                    word.start_index, word.end_index, word.text, word.definition
                );
            }
        }
    }
    out
}

/// One line per course, followed by its lesson titles.
fn course_list(overview: &[CourseOverview]) -> String {
    let mut out = String::new();
    for entry in overview {
        let course = &entry.course;
        let _ = writeln!(
            out,
            "{}  {} (level {}, {})",
            course.id(),
            course.title(),
            course.level(),
            course.status()
        );
        for title in &entry.lesson_titles {
            let _ = writeln!(out, "      - {title}");
        }
    }
    out
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let mut parsed = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    tracing::debug!(command = ?cmd, db = %parsed.db_url, "starting");

    if cmd == Command::Render {
        let text = required(parsed.text, "--text")?;
        println!("{}", course_core::render(&text)?);
        return Ok(());
    }

    let teacher = parsed.teacher()?;
    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let services = AppServices::new_sqlite(&parsed.db_url, Clock::default(), teacher.clone()).await?;

    match cmd {
        Command::Show => {
            let deck = services.deck_service();
            let mut session = BrowserSession::open(&deck, parsed.course_id()?, &teacher).await?;
            if let Some(lesson) = parsed.lesson {
                session.select_lesson(lesson)?;
            }
            if let Some(card) = parsed.card {
                session.select_card(card)?;
            }
            if parsed.json {
                println!("{}", serde_json::to_string_pretty(session.tree().as_ref())?);
            } else {
                print!("{}", outline(&session));
            }
            Ok(())
        }
        Command::List => {
            let overview = services.deck_service().overview(&teacher).await?;
            print!("{}", course_list(&overview));
            Ok(())
        }
        Command::SetStatus => {
            let course_id = parsed.course_id()?;
            let status = parsed.status()?;
            services.deck_service().set_status(course_id, status).await?;
            println!("{course_id} {status}");
            Ok(())
        }
        Command::CreateCourse => {
            let draft = CourseDraft::new(
                required(parsed.level, "--level")?,
                required(parsed.title, "--title")?,
            );
            let id = services.deck_service().create_course(draft, &teacher).await?;
            println!("{id}");
            Ok(())
        }
        Command::AddWord => {
            let draft = WordDraft {
                phonetic: parsed.phonetic.unwrap_or_default(),
                part_of_speech: parsed.part_of_speech.unwrap_or_default(),
                ..WordDraft::new(
                    required(parsed.text, "--text")?,
                    required(parsed.definition, "--definition")?,
                )
            };
            let id = services.card_service().add_word(draft).await?;
            println!("{id}");
            Ok(())
        }
        _ => {
            if matches!(cmd, Command::AddLesson | Command::AddCard) && parsed.order.is_none() {
                let tree = services
                    .deck_service()
                    .load_tree(parsed.course_id()?, &teacher)
                    .await?;
                parsed.fill_append_order(cmd, &tree)?;
            }
            let mutation = parsed.mutation(cmd)?;
            let dispatcher = services.dispatcher();
            let mut events = dispatcher.subscribe();
            let ticket = dispatcher.dispatch(mutation);
            let outcome = wait_for(&mut events, ticket).await;
            dispatcher.shutdown().await;

            match outcome {
                Some(DispatchEvent::Applied { tree, .. }) => {
                    let mut session = BrowserSession::from_snapshot(tree);
                    if let Some(lesson) = parsed.lesson {
                        // The edited lesson may be gone after a delete; keep the default then.
                        let _ = session.select_lesson(lesson);
                    }
                    print!("{}", outline(&session));
                    Ok(())
                }
                Some(DispatchEvent::Failed { mutation, error, .. }) => Err(std::io::Error::other(
                    format!("{} failed: {error}", mutation.kind()),
                )
                .into()),
                None => Err(std::io::Error::other("mutation worker stopped").into()),
            }
        }
    }
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" || db_url.contains("mode=memory") {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    logging::init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use course_core::time::fixed_now;
    use course_core::{DeckRow, reduce_rows};

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = args.iter().map(|s| (*s).to_owned());
        Args::parse(&mut iter)
    }

    #[test]
    fn mutation_flags_build_mutation() {
        let args = parse(&["--course-id", "3", "--lesson", "1", "--order", "0", "--text", "#New#"])
            .unwrap();
        assert_eq!(
            args.mutation(Command::EditCard).unwrap(),
            Mutation::EditCard {
                course_id: CourseId::new(3),
                lesson_order: 1,
                order: 0,
                text: "#New#".to_owned(),
            }
        );
    }

    #[test]
    fn insert_order_defaults_to_snapshot_count() {
        let base = DeckRow::course(CourseId::new(3), 1, "School");
        let tree = reduce_rows(&[
            base.clone().with_lesson(0, "Introduction"),
            base.clone().with_lesson(1, "Chapter 1").with_card(0, "#New#"),
        ])
        .unwrap();

        let mut args = parse(&["--course-id", "3", "--lesson", "1", "--text", "#old#"]).unwrap();
        args.fill_append_order(Command::AddCard, &tree).unwrap();
        assert_eq!(
            args.mutation(Command::AddCard).unwrap(),
            Mutation::AddCard {
                course_id: CourseId::new(3),
                lesson_order: 1,
                order: 1,
                text: "#old#".to_owned(),
            }
        );

        let mut args = parse(&["--course-id", "3", "--title", "Chapter 2"]).unwrap();
        args.fill_append_order(Command::AddLesson, &tree).unwrap();
        assert_eq!(args.order, Some(2));

        let mut args =
            parse(&["--course-id", "3", "--title", "Again", "--order", "1"]).unwrap();
        args.fill_append_order(Command::AddLesson, &tree).unwrap();
        assert_eq!(
            args.mutation(Command::AddLesson).unwrap(),
            Mutation::AddLesson {
                course_id: CourseId::new(3),
                order: 1,
                title: "Again".to_owned(),
            }
        );
    }

    #[test]
    fn status_flag_parses_course_status() {
        let args = parse(&["--status", "in_review"]).unwrap();
        assert_eq!(args.status().unwrap(), CourseStatus::InReview);

        let args = parse(&["--status", "live"]).unwrap();
        assert!(matches!(args.status(), Err(ArgsError::InvalidStatus { .. })));
        let args = parse(&[]).unwrap();
        assert!(matches!(
            args.status(),
            Err(ArgsError::MissingFlag { flag: "--status" })
        ));
    }

    #[test]
    fn course_list_shows_lessons() {
        let course = CourseDraft::new(1, "School")
            .validate(CourseId::new(4), fixed_now())
            .unwrap();
        let text = course_list(&[CourseOverview {
            course,
            lesson_titles: vec!["Introduction".to_owned(), "Chapter 1".to_owned()],
        }]);
        assert_eq!(
            text,
            "4  School (level 1, DRAFT)\n      - Introduction\n      - Chapter 1\n"
        );
    }

    #[test]
    fn missing_flag_is_reported() {
        let args = parse(&["--course-id", "3"]).unwrap();
        let err = args.mutation(Command::DeleteLesson).unwrap_err();
        assert_eq!(err.to_string(), "--order is required");
    }

    #[test]
    fn bad_numbers_and_unknown_flags_fail() {
        assert!(matches!(
            parse(&["--lesson", "one"]),
            Err(ArgsError::InvalidNumber { flag: "--lesson", .. })
        ));
        assert!(matches!(
            parse(&["--order"]),
            Err(ArgsError::MissingValue { flag: "--order" })
        ));
        assert!(matches!(parse(&["--bogus"]), Err(ArgsError::UnknownArg(_))));
    }

    #[test]
    fn memory_urls_pass_through() {
        let url = "sqlite:file:memdb_cli?mode=memory&cache=shared".to_owned();
        assert_eq!(normalize_sqlite_url(url.clone()), url);
        assert!(prepare_sqlite_file(&url).is_ok());
    }

    #[test]
    fn outline_marks_selection() {
        let base = DeckRow::course(CourseId::new(1), 1, "School");
        let rows = vec![
            base.clone().with_lesson(0, "Introduction"),
            base.clone()
                .with_lesson(1, "Chapter 1")
                .with_card(0, "Is your school #big#?")
                .with_word(15, 18, "big", "large in size"),
        ];
        let mut session = BrowserSession::from_snapshot(Arc::new(reduce_rows(&rows).unwrap()));
        session.select_lesson(1).unwrap();

        let text = outline(&session);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "School (course 1, level 1)");
        assert_eq!(lines[1], "  [0] Introduction");
        assert_eq!(lines[2], "> [1] Chapter 1");
        assert_eq!(lines[3], "    > (0) Is your school big?");
        assert_eq!(lines[4], "          15..18 big: large in size");
    }
}
