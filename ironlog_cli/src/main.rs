use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use ironlog_core::ledger::PlannedExercise;
use ironlog_core::*;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ironlog")]
#[command(about = "Personal training ledger", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Whose ledger to act on
    #[arg(long, global = true, default_value = "local")]
    user: String,

    /// Log ironlog's own activity (info, then debug with -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan, perform and inspect workouts
    #[command(subcommand)]
    Workout(WorkoutCommand),

    /// Browse and manage templates
    #[command(subcommand)]
    Template(TemplateCommand),

    /// Personal workouts derived from templates
    #[command(subcommand)]
    Personal(PersonalCommand),

    /// Training statistics
    Stats {
        /// First day to include (YYYY-MM-DD)
        #[arg(long)]
        since: Option<NaiveDate>,

        /// First day to exclude (YYYY-MM-DD)
        #[arg(long)]
        until: Option<NaiveDate>,
    },

    /// Levels, heat, streak, achievements and milestones
    Progress,

    /// Personal records
    Records {
        /// Include superseded records
        #[arg(long)]
        history: bool,
    },

    /// What to train today
    Today {
        /// Show this many templates across categories instead
        #[arg(long)]
        diverse: Option<usize>,
    },

    /// Export completed sets as CSV
    Export {
        /// Output file
        path: PathBuf,
    },

    /// Seed the system templates if none exist
    Seed,
}

#[derive(Subcommand)]
enum WorkoutCommand {
    /// Plan a workout from catalog exercises
    Plan {
        /// Workout name
        #[arg(long)]
        name: String,

        /// Exercise as ID or ID:SETSxREPS@WEIGHT (e.g. bench_press:3x8@60)
        #[arg(long = "exercise", value_parser = parse_planned)]
        exercises: Vec<PlannedExercise>,

        /// Target body areas
        #[arg(long = "area")]
        areas: Vec<String>,

        /// Planned duration in minutes
        #[arg(long)]
        minutes: Option<u32>,
    },

    /// Start a planned workout
    Start { id: String },

    /// Start a workout from a template
    FromTemplate { template_id: String },

    /// Start a workout from a personal workout
    FromPersonal { personal_id: String },

    /// Log a set
    Log {
        workout_id: String,
        /// Workout exercise id (see `workout show`)
        exercise: String,
        #[arg(long)]
        weight: f64,
        #[arg(long)]
        reps: u32,
        /// Record the set without completing it
        #[arg(long)]
        pending: bool,
    },

    /// Mark a planned set as done
    CompleteSet { workout_id: String, set_id: String },

    /// Change the weight and reps of a set
    EditSet {
        workout_id: String,
        set_id: String,
        #[arg(long)]
        weight: f64,
        #[arg(long)]
        reps: u32,
    },

    /// Complete a workout
    Complete { id: String },

    /// Cancel a workout
    Cancel { id: String },

    /// Delete a workout
    Delete { id: String },

    /// Show one workout
    Show {
        id: String,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// List workouts, newest first
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Listing,
    Name,
    Usage,
    Recency,
}

impl From<SortArg> for TemplateSort {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Listing => TemplateSort::Listing,
            SortArg::Name => TemplateSort::Name,
            SortArg::Usage => TemplateSort::Usage,
            SortArg::Recency => TemplateSort::Recency,
        }
    }
}

#[derive(Args)]
struct TemplateListArgs {
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    difficulty: Option<String>,
    /// Substring of the name or description
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    favorites: bool,
    #[arg(long, value_enum, default_value = "listing")]
    sort: SortArg,
}

#[derive(Subcommand)]
enum TemplateCommand {
    /// List templates visible to the user
    List(TemplateListArgs),

    /// Show one template
    Show { id: String },

    /// Mark or unmark a favorite
    Favorite {
        id: String,
        #[arg(long)]
        off: bool,
    },

    /// Delete one of your templates
    Delete { id: String },
}

#[derive(Subcommand)]
enum PersonalCommand {
    /// Copy a template into a personal workout
    FromTemplate {
        template_id: String,
        #[arg(long)]
        name: Option<String>,
    },

    /// Create an empty personal workout
    Custom { name: String },

    /// Add a catalog exercise
    Add {
        id: String,
        exercise_id: String,
        #[arg(long, default_value_t = 3)]
        sets: u32,
        #[arg(long, default_value_t = 8)]
        rep_min: u32,
        #[arg(long, default_value_t = 12)]
        rep_max: u32,
        #[arg(long)]
        weight: Option<f64>,
    },

    /// Remove an exercise
    Remove { id: String, exercise: String },

    /// Change the prescription of an exercise
    Modify {
        id: String,
        exercise: String,
        #[arg(long)]
        sets: Option<u32>,
        /// Rep range as MIN-MAX
        #[arg(long, value_parser = parse_rep_range)]
        reps: Option<(u32, u32)>,
        #[arg(long)]
        weight: Option<f64>,
        #[arg(long)]
        rest: Option<u32>,
    },

    /// Rename a personal workout
    Rename {
        id: String,
        name: String,
        #[arg(long)]
        description: Option<String>,
    },

    /// Show the effective exercises
    Show { id: String },

    /// List personal workouts
    List,

    /// Delete a personal workout
    Delete { id: String },
}

fn parse_planned(s: &str) -> std::result::Result<PlannedExercise, String> {
    let (id, prescription) = match s.split_once(':') {
        Some((id, rest)) => (id, Some(rest)),
        None => (s, None),
    };
    if id.trim().is_empty() {
        return Err("exercise id is empty".into());
    }

    let (sets, reps, weight) = match prescription {
        None => (0, 0, 0.0),
        Some(p) => {
            let (volume, weight) = match p.split_once('@') {
                Some((v, w)) => (v, w.parse::<f64>().map_err(|e| format!("bad weight '{}': {}", w, e))?),
                None => (p, 0.0),
            };
            let (sets, reps) = volume
                .split_once('x')
                .ok_or_else(|| format!("expected SETSxREPS, got '{}'", volume))?;
            (
                sets.parse::<u32>().map_err(|e| format!("bad set count '{}': {}", sets, e))?,
                reps.parse::<u32>().map_err(|e| format!("bad rep count '{}': {}", reps, e))?,
                weight,
            )
        }
    };

    Ok(PlannedExercise {
        exercise_id: id.trim().to_string(),
        sets,
        weight,
        reps,
    })
}

fn parse_rep_range(s: &str) -> std::result::Result<(u32, u32), String> {
    let (min, max) = s
        .split_once('-')
        .ok_or_else(|| format!("expected MIN-MAX, got '{}'", s))?;
    let min = min.parse().map_err(|e| format!("bad minimum '{}': {}", min, e))?;
    let max = max.parse().map_err(|e| format!("bad maximum '{}': {}", max, e))?;
    Ok((min, max))
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.verbose {
        0 => ironlog_core::logging::init(),
        1 => ironlog_core::logging::init_with_level("info"),
        _ => ironlog_core::logging::init_with_level("debug"),
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            if e.is_retryable() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(dir) = cli.data_dir {
        config.data.data_dir = dir;
    }

    tracing::debug!(data_dir = %config.data.data_dir.display(), user = %cli.user, "opening ledger");
    let ledger = Ledger::open(config)?;
    let user = cli.user.as_str();

    match cli.command {
        Commands::Workout(cmd) => cmd_workout(&ledger, user, cmd),
        Commands::Template(cmd) => cmd_template(&ledger, user, cmd),
        Commands::Personal(cmd) => cmd_personal(&ledger, user, cmd),
        Commands::Stats { since, until } => cmd_stats(&ledger, user, since, until),
        Commands::Progress => cmd_progress(&ledger, user),
        Commands::Records { history } => cmd_records(&ledger, user, history),
        Commands::Today { diverse } => cmd_today(&ledger, user, diverse),
        Commands::Export { path } => {
            let rows = ledger.export_sets(user, &path)?;
            println!("Exported {} sets to {}", rows, path.display());
            Ok(())
        }
        Commands::Seed => {
            let seeded = ledger.seed_system_templates()?;
            println!("Seeded {} system templates", seeded);
            Ok(())
        }
    }
}

fn print_workout(workout: &Workout) {
    println!("Workout {} [{}]", workout.id, workout.status);
    println!("  {} ({})", workout.name, workout.session_date());
    for exercise in workout.ordered_exercises() {
        println!("  exercise {} {}", exercise.id, exercise.exercise_name);
        for set in &exercise.sets {
            let mark = if set.completed { "done" } else { "todo" };
            println!(
                "    set {} #{} {} x {} {}",
                set.id, set.set_number, set.weight, set.reps, mark
            );
        }
    }
    println!("  volume {}", workout.total_volume());
}

fn print_records(records: &[PersonalRecord]) {
    for record in records {
        match record.secondary_value {
            Some(weight) => println!(
                "  New personal record: {} {} {} (at {})",
                record.exercise_name, record.kind, record.value, weight
            ),
            None => println!(
                "  New personal record: {} {} {}",
                record.exercise_name, record.kind, record.value
            ),
        }
    }
}

fn cmd_workout(ledger: &Ledger, user: &str, cmd: WorkoutCommand) -> Result<()> {
    match cmd {
        WorkoutCommand::Plan {
            name,
            exercises,
            areas,
            minutes,
        } => {
            let mut plan = WorkoutPlan::new(name).with_body_areas(&areas);
            plan.exercises = exercises;
            plan.planned_duration_minutes = minutes;
            let workout = ledger.plan_workout(user, &plan)?;
            println!("Planned workout {}", workout.id);
            print_workout(&workout);
        }
        WorkoutCommand::Start { id } => {
            ledger.start_workout(&id)?;
            println!("Started workout {}", id);
        }
        WorkoutCommand::FromTemplate { template_id } => {
            let workout = ledger.start_from_template(user, &template_id)?;
            println!("Started workout {}", workout.id);
            print_workout(&workout);
        }
        WorkoutCommand::FromPersonal { personal_id } => {
            let workout = ledger.start_from_user_workout(&personal_id)?;
            println!("Started workout {}", workout.id);
            print_workout(&workout);
        }
        WorkoutCommand::Log {
            workout_id,
            exercise,
            weight,
            reps,
            pending,
        } => {
            let logged = ledger.log_set(&workout_id, &exercise, weight, reps, !pending)?;
            println!(
                "Logged set #{} ({}) {} x {}",
                logged.set.set_number, logged.set.id, logged.set.weight, logged.set.reps
            );
            print_records(&logged.records);
        }
        WorkoutCommand::CompleteSet { workout_id, set_id } => {
            let logged = ledger.complete_set(&workout_id, &set_id)?;
            println!("Completed set #{}", logged.set.set_number);
            print_records(&logged.records);
        }
        WorkoutCommand::EditSet {
            workout_id,
            set_id,
            weight,
            reps,
        } => {
            let logged = ledger.update_set(&workout_id, &set_id, weight, reps)?;
            println!("Updated set #{} to {} x {}", logged.set.set_number, weight, reps);
        }
        WorkoutCommand::Complete { id } => {
            let completed = ledger.complete_workout(&id)?;
            println!(
                "Completed workout {}: volume {}",
                id, completed.outcome.volume
            );
            for level_up in &completed.outcome.level_ups {
                println!("  Level up: {} reached level {}", level_up.body_area, level_up.level);
            }
            for achievement in &completed.outcome.new_achievements {
                println!("  Achievement earned: {}", achievement.title);
            }
        }
        WorkoutCommand::Cancel { id } => {
            ledger.cancel_workout(&id)?;
            println!("Cancelled workout {}", id);
        }
        WorkoutCommand::Delete { id } => {
            if ledger.delete_workout(&id)? {
                println!("Deleted workout {}", id);
            } else {
                println!("No workout {}", id);
            }
        }
        WorkoutCommand::Show { id, json } => {
            let workout = ledger
                .get_workout(&id)?
                .ok_or_else(|| Error::NotFound(format!("workout {}", id)))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&workout)?);
            } else {
                print_workout(&workout);
            }
        }
        WorkoutCommand::List { status, limit } => {
            let mut filter = WorkoutFilter::for_owner(user);
            if let Some(status) = status {
                filter = filter.with_status(status.parse()?);
            }
            if let Some(limit) = limit {
                filter = filter.with_limit(limit);
            }
            let summaries = ledger.workout_summaries(&filter)?;
            if summaries.is_empty() {
                println!("No workouts");
            }
            for s in summaries {
                println!(
                    "{}  {}  {:<11}  {}  sets {}/{}  volume {}",
                    s.id,
                    s.session_time.date_naive(),
                    s.status,
                    s.name,
                    s.completed_set_count,
                    s.set_count,
                    s.total_volume
                );
            }
        }
    }
    Ok(())
}

fn print_template(template: &WorkoutTemplate) {
    let favorite = if template.is_favorite { " *" } else { "" };
    println!(
        "{}  {:<10}  {:<12}  {}{}  used {}x",
        template.id,
        template.category,
        template.difficulty,
        template.name,
        favorite,
        template.usage_count
    );
}

fn cmd_template(ledger: &Ledger, user: &str, cmd: TemplateCommand) -> Result<()> {
    match cmd {
        TemplateCommand::List(args) => {
            let mut filter = TemplateFilter::visible_to(user).sorted_by(args.sort.into());
            if let Some(category) = args.category {
                filter = filter.with_category(category.parse()?);
            }
            if let Some(difficulty) = args.difficulty {
                filter.difficulty = Some(difficulty.parse()?);
            }
            filter.search = args.search;
            filter.favorites_only = args.favorites;
            for template in ledger.list_templates(&filter)? {
                print_template(&template);
            }
        }
        TemplateCommand::Show { id } => {
            let template = ledger
                .get_template(&id)?
                .ok_or_else(|| Error::NotFound(format!("template {}", id)))?;
            print_template(&template);
            if let Some(description) = &template.description {
                println!("  {}", description);
            }
            for e in template.ordered_exercises() {
                println!(
                    "  {}. {}  {} x {}-{}  rest {}s",
                    e.position + 1,
                    e.exercise_name,
                    e.suggested_sets,
                    e.rep_min,
                    e.rep_max,
                    e.rest_seconds
                );
            }
        }
        TemplateCommand::Favorite { id, off } => {
            ledger.set_template_favorite(user, &id, !off)?;
            println!("{} {}", if off { "Unfavorited" } else { "Favorited" }, id);
        }
        TemplateCommand::Delete { id } => {
            if ledger.delete_template(user, &id)? {
                println!("Deleted template {}", id);
            } else {
                println!("No template {}", id);
            }
        }
    }
    Ok(())
}

fn print_user_workout(ledger: &Ledger, user_workout: &UserWorkout) -> Result<()> {
    println!("Personal workout {}", user_workout.id);
    println!("  {} ({} edits)", user_workout.name, user_workout.customizations.events.len());
    for e in ledger.effective_exercises(&user_workout.id)? {
        let weight = e.weight.map(|w| format!(" @ {}", w)).unwrap_or_default();
        println!(
            "  exercise {} {}  {} x {}-{}{}",
            e.id, e.exercise_name, e.sets, e.rep_min, e.rep_max, weight
        );
    }
    Ok(())
}

fn cmd_personal(ledger: &Ledger, user: &str, cmd: PersonalCommand) -> Result<()> {
    match cmd {
        PersonalCommand::FromTemplate { template_id, name } => {
            let created = ledger.create_user_workout_from_template(user, &template_id, name.as_deref())?;
            print_user_workout(ledger, &created)?;
        }
        PersonalCommand::Custom { name } => {
            let created = ledger.create_custom_user_workout(user, &name)?;
            print_user_workout(ledger, &created)?;
        }
        PersonalCommand::Add {
            id,
            exercise_id,
            sets,
            rep_min,
            rep_max,
            weight,
        } => {
            let mut entry = NewUserExercise::new(exercise_id, sets, rep_min, rep_max);
            entry.weight = weight;
            let updated = ledger.add_user_exercise(&id, &entry)?;
            print_user_workout(ledger, &updated)?;
        }
        PersonalCommand::Remove { id, exercise } => {
            let updated = ledger.remove_user_exercise(&id, &exercise)?;
            print_user_workout(ledger, &updated)?;
        }
        PersonalCommand::Modify {
            id,
            exercise,
            sets,
            reps,
            weight,
            rest,
        } => {
            let mut changes = Vec::new();
            if let Some(sets) = sets {
                changes.push(ExerciseChange::Sets(sets));
            }
            if let Some((min, max)) = reps {
                changes.push(ExerciseChange::RepRange { min, max });
            }
            if let Some(weight) = weight {
                changes.push(ExerciseChange::Weight(Some(weight)));
            }
            if let Some(rest) = rest {
                changes.push(ExerciseChange::Rest(rest));
            }
            if changes.is_empty() {
                return Err(Error::Validation("nothing to modify".into()));
            }
            for change in changes {
                ledger.modify_user_exercise(&id, &exercise, change)?;
            }
            let updated = ledger
                .get_user_workout(&id)?
                .ok_or_else(|| Error::NotFound(format!("user workout {}", id)))?;
            print_user_workout(ledger, &updated)?;
        }
        PersonalCommand::Rename {
            id,
            name,
            description,
        } => {
            let updated = ledger.update_user_workout(&id, &name, description.as_deref())?;
            print_user_workout(ledger, &updated)?;
        }
        PersonalCommand::Show { id } => {
            let user_workout = ledger
                .get_user_workout(&id)?
                .ok_or_else(|| Error::NotFound(format!("user workout {}", id)))?;
            print_user_workout(ledger, &user_workout)?;
        }
        PersonalCommand::List => {
            for w in ledger.list_user_workouts(&UserWorkoutFilter::for_owner(user))? {
                println!("{}  {}  updated {}", w.id, w.name, w.updated_at.date_naive());
            }
        }
        PersonalCommand::Delete { id } => {
            if ledger.delete_user_workout(&id)? {
                println!("Deleted personal workout {}", id);
            } else {
                println!("No personal workout {}", id);
            }
        }
    }
    Ok(())
}

fn cmd_stats(
    ledger: &Ledger,
    user: &str,
    since: Option<NaiveDate>,
    until: Option<NaiveDate>,
) -> Result<()> {
    let query = StatsQuery::window(user, since.map(day_start), until.map(day_start));
    let stats = ledger.stats(&query)?;

    println!("Workouts:        {} ({} completed)", stats.total_workouts, stats.completed_workouts);
    println!("Completion rate: {:.0}%", stats.completion_rate * 100.0);
    println!("Total volume:    {}", stats.total_volume);
    println!("Sets:            {}/{}", stats.completed_sets, stats.total_sets);
    match stats.average_duration_seconds {
        Some(seconds) => println!("Avg duration:    {:.0} min", seconds / 60.0),
        None => println!("Avg duration:    -"),
    }
    for (area, volume) in &stats.volume_by_body_area {
        println!("  {:<12} {}", area, volume);
    }
    if stats.unattributed_volume > 0.0 {
        println!("  {:<12} {}", "(none)", stats.unattributed_volume);
    }
    Ok(())
}

fn cmd_progress(ledger: &Ledger, user: &str) -> Result<()> {
    let snapshot = ledger.progress(user)?;
    let heat = ledger.heat_map(user)?;

    println!("Body areas:");
    for (area, progress) in &snapshot.body_areas {
        println!(
            "  {:<12} level {}  {}/{} exp  heat {:.2}",
            area,
            progress.level,
            progress.experience,
            progress.experience_to_next_level,
            heat.get(area).copied().unwrap_or(0.0)
        );
    }
    println!(
        "Streak: {} days (longest {})",
        snapshot.streak.current, snapshot.streak.longest
    );
    println!("Achievements:");
    for achievement in &snapshot.achievements {
        println!("  {} {}", achievement.icon, achievement.title);
    }
    println!("Milestones:");
    for milestone in &snapshot.milestones {
        let mark = if milestone.completed { "x" } else { " " };
        println!(
            "  [{}] {} ({}/{})",
            mark, milestone.title, milestone.current_value, milestone.target_value
        );
    }
    Ok(())
}

fn cmd_records(ledger: &Ledger, user: &str, history: bool) -> Result<()> {
    let records = ledger.personal_records(user, history)?;
    if records.is_empty() {
        println!("No personal records yet");
    }
    for record in records {
        let current = if record.is_current { "" } else { " (superseded)" };
        match record.secondary_value {
            Some(weight) => println!(
                "{}  {}  {} at {}  {}{}",
                record.exercise_name,
                record.kind,
                record.value,
                weight,
                record.achieved_at.date_naive(),
                current
            ),
            None => println!(
                "{}  {}  {}  {}{}",
                record.exercise_name,
                record.kind,
                record.value,
                record.achieved_at.date_naive(),
                current
            ),
        }
    }
    Ok(())
}

fn cmd_today(ledger: &Ledger, user: &str, diverse: Option<usize>) -> Result<()> {
    if let Some(count) = diverse {
        for template in ledger.diverse_recommendations(user, Some(count))? {
            print_template(&template);
        }
        return Ok(());
    }

    match ledger.todays_recommendation(user)? {
        Some(pick) => {
            let why = match &pick.reason {
                RecommendationReason::Preferred { category } => format!("{} day", category),
                RecommendationReason::AnyAvailable => "least used".to_string(),
                RecommendationReason::SafeFallback { category } => format!("fallback {}", category),
            };
            println!("Today ({}): {} [{}] ({})", pick.weekday, pick.template.name, pick.template.category, why);
            println!("  template {}", pick.template.id);
        }
        None => println!("No template to recommend"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_planned_forms() {
        let bare = parse_planned("bench_press").unwrap();
        assert_eq!(bare.exercise_id, "bench_press");
        assert_eq!((bare.sets, bare.reps, bare.weight), (0, 0, 0.0));

        let full = parse_planned("bench_press:3x8@62.5").unwrap();
        assert_eq!((full.sets, full.reps, full.weight), (3, 8, 62.5));

        let bodyweight = parse_planned("push_up:2x15").unwrap();
        assert_eq!((bodyweight.sets, bodyweight.reps, bodyweight.weight), (2, 15, 0.0));

        assert!(parse_planned(":3x8").is_err());
        assert!(parse_planned("squat:3@100").is_err());
        assert!(parse_planned("squat:3x8@heavy").is_err());
    }

    #[test]
    fn test_parse_rep_range() {
        assert_eq!(parse_rep_range("6-10").unwrap(), (6, 10));
        assert!(parse_rep_range("6").is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
