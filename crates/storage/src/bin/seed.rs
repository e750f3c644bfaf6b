use std::fmt;

use chrono::{DateTime, Duration, Utc};
use quiz_core::model::{
    CategoryId, Difficulty, OptionDraft, QuestionDraft, QuestionId, ReviewAction, TagId, UserId,
};
use storage::repository::{QuestionRepository, Storage};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    author: UserId,
    copies: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidAuthor { raw: String },
    InvalidCopies { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidAuthor { raw } => write!(f, "invalid --author value: {raw}"),
            ArgsError::InvalidCopies { raw } => write!(f, "invalid --copies value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://quiz.sqlite3?mode=rwc".into());
        let mut author = UserId::random();
        let mut copies = 1;
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--author" => {
                    let value = require_value(&mut args, "--author")?;
                    author = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidAuthor { raw: value.clone() })?;
                }
                "--copies" => {
                    let value = require_value(&mut args, "--copies")?;
                    copies = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidCopies { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            author,
            copies,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: $DATABASE_URL or sqlite://quiz.sqlite3?mode=rwc)");
    eprintln!("  --author <uuid>           Author id recorded on seeded questions (default: random)");
    eprintln!("  --copies <n>              How many times to insert the sample bank (default: 1)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
}

struct Sample {
    title: &'static str,
    difficulty: Difficulty,
    correct: &'static str,
    distractors: [&'static str; 3],
}

const SAMPLES: [Sample; 5] = [
    Sample {
        title: "Caseating granulomas are most characteristic of which infection?",
        difficulty: Difficulty::Easy,
        correct: "Tuberculosis",
        distractors: ["Sarcoidosis", "Crohn disease", "Cat-scratch disease"],
    },
    Sample {
        title: "Which cell type dominates the infiltrate in acute inflammation?",
        difficulty: Difficulty::Easy,
        correct: "Neutrophils",
        distractors: ["Lymphocytes", "Plasma cells", "Eosinophils"],
    },
    Sample {
        title: "Psammoma bodies are classically seen in which thyroid carcinoma?",
        difficulty: Difficulty::Medium,
        correct: "Papillary carcinoma",
        distractors: ["Follicular carcinoma", "Medullary carcinoma", "Anaplastic carcinoma"],
    },
    Sample {
        title: "Reed-Sternberg cells are diagnostic of which lymphoma?",
        difficulty: Difficulty::Medium,
        correct: "Hodgkin lymphoma",
        distractors: ["Burkitt lymphoma", "Mantle cell lymphoma", "Follicular lymphoma"],
    },
    Sample {
        title: "Mallory-Denk bodies are composed mainly of which protein?",
        difficulty: Difficulty::Hard,
        correct: "Intermediate filaments (keratin)",
        distractors: ["Amyloid", "Lipofuscin", "Hemosiderin"],
    },
];

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);
    let category = CategoryId::random();
    let tag = TagId::random();

    let mut inserted = 0_u32;
    for copy in 0..args.copies {
        for (i, sample) in SAMPLES.iter().enumerate() {
            let mut options = vec![OptionDraft {
                text: sample.correct.into(),
                is_correct: true,
            }];
            options.extend(sample.distractors.iter().map(|text| OptionDraft {
                text: (*text).into(),
                is_correct: false,
            }));

            let offset = i64::from(copy) * 60 + i64::try_from(i)?;
            let created_at = now - Duration::minutes(offset);
            let draft = QuestionDraft {
                title: sample.title.into(),
                category_id: Some(category),
                question_set_id: None,
                tags: if i % 2 == 0 { vec![tag] } else { Vec::new() },
                difficulty: sample.difficulty,
                options,
            };
            let mut question = draft.validate(QuestionId::random(), args.author, created_at)?;
            for action in [
                ReviewAction::Submit,
                ReviewAction::Approve,
                ReviewAction::Publish,
            ] {
                question.apply_review(action, created_at)?;
            }
            storage.questions.upsert_question(&question).await?;
            inserted += 1;
        }
    }

    println!(
        "Seeded {inserted} published questions into {} (category {category}, tag {tag})",
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
