//! KPI and chart aggregation over fetched rows.
//!
//! Everything here except [`DashboardService`] is a pure function of the
//! rows passed in, so each piece can be checked without a database.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use db::models::{
    client_meeting::ClientMeeting,
    expense::{Expense, ExpenseCategory},
    incident::{Incident, IncidentSeverity},
    ledger::{LedgerEntry, LedgerKind},
    profile::Profile,
    project::{Project, ProjectStatus},
    report::Report,
    survey::Survey,
    task::{Task, TaskStatus},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use strum::IntoEnumIterator;
use thiserror::Error;
use tracing::warn;
use ts_rs::TS;
use utils::format::{
    days_until, format_compact_currency, format_currency, format_date_long, format_month, percent,
    relative_days,
};
use uuid::Uuid;

pub const DEFAULT_MONTHS: u32 = 6;
const LIST_LIMIT: usize = 5;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct ProjectKpis {
    pub active_projects: usize,
    pub total_projects: usize,
    pub total_budget_cents: i64,
    pub total_spent_cents: i64,
    pub budget_used_pct: f64,
    pub open_incidents: usize,
    pub critical_incidents: usize,
    pub pending_tasks: usize,
    pub overdue_tasks: usize,
    pub task_completion_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct CategoryTotal {
    pub category: ExpenseCategory,
    pub label: String,
    pub total_cents: i64,
    pub pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct StatusCount<S> {
    pub status: S,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct MonthlyPoint {
    pub label: String,
    pub year: i32,
    pub month: u32,
    pub income_cents: i64,
    pub expense_cents: i64,
    pub balance_cents: i64,
    /// Axis label, e.g. `"$1.2M"`.
    pub balance_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct ProjectProgress {
    pub task_pct: f64,
    pub budget_used_pct: f64,
    pub spent_cents: i64,
    pub remaining_cents: i64,
    pub over_budget: bool,
    pub overdue: bool,
    /// Days until the planned end date; negative once it has passed.
    pub days_to_deadline: Option<i64>,
    pub deadline_label: Option<String>,
}

/// Card texts for the headline figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct KpiLabels {
    pub total_budget: String,
    pub total_spent: String,
    pub remaining: String,
    pub as_of: String,
}

impl KpiLabels {
    pub fn new(kpis: &ProjectKpis, currency: &str, today: NaiveDate) -> Self {
        Self {
            total_budget: format_currency(kpis.total_budget_cents, currency),
            total_spent: format_currency(kpis.total_spent_cents, currency),
            remaining: format_currency(kpis.total_budget_cents - kpis.total_spent_cents, currency),
            as_of: format_date_long(today),
        }
    }
}

/// One dated money movement feeding the monthly series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Movement {
    pub date: NaiveDate,
    pub kind: LedgerKind,
    pub amount_cents: i64,
}

impl From<&LedgerEntry> for Movement {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            date: entry.entry_date,
            kind: entry.kind,
            amount_cents: entry.amount_cents,
        }
    }
}

impl From<&Expense> for Movement {
    fn from(expense: &Expense) -> Self {
        Self {
            date: expense.expense_date,
            kind: LedgerKind::Expense,
            amount_cents: expense.amount_cents,
        }
    }
}

pub fn compute_kpis(
    projects: &[Project],
    tasks: &[Task],
    expenses: &[Expense],
    incidents: &[Incident],
    today: NaiveDate,
) -> ProjectKpis {
    // Cancelled projects drop out of both sides of the budget ratio.
    let cancelled: HashSet<Uuid> = projects
        .iter()
        .filter(|p| p.status == ProjectStatus::Cancelled)
        .map(|p| p.id)
        .collect();
    let total_budget_cents: i64 = projects
        .iter()
        .filter(|p| !cancelled.contains(&p.id))
        .map(|p| p.budget_cents)
        .sum();
    let total_spent_cents: i64 = expenses
        .iter()
        .filter(|e| !cancelled.contains(&e.project_id))
        .map(|e| e.amount_cents)
        .sum();
    let completed = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .count();
    let open: Vec<&Incident> = incidents.iter().filter(|i| i.status.is_open()).collect();

    ProjectKpis {
        active_projects: projects
            .iter()
            .filter(|p| p.status == ProjectStatus::Active)
            .count(),
        total_projects: projects.len(),
        total_budget_cents,
        total_spent_cents,
        budget_used_pct: percent(total_spent_cents, total_budget_cents),
        open_incidents: open.len(),
        critical_incidents: open
            .iter()
            .filter(|i| i.severity == IncidentSeverity::Critical)
            .count(),
        pending_tasks: tasks.len() - completed,
        overdue_tasks: tasks.iter().filter(|t| t.is_overdue(today)).count(),
        task_completion_pct: percent(completed as i64, tasks.len() as i64),
    }
}

/// Spend per category, largest first. Categories without spend are omitted.
pub fn expenses_by_category(expenses: &[Expense]) -> Vec<CategoryTotal> {
    let mut totals: HashMap<ExpenseCategory, i64> = HashMap::new();
    for expense in expenses {
        *totals.entry(expense.category).or_default() += expense.amount_cents;
    }
    let grand_total: i64 = totals.values().sum();

    let mut rows: Vec<CategoryTotal> = ExpenseCategory::iter()
        .filter_map(|category| {
            let total_cents = *totals.get(&category)?;
            Some(CategoryTotal {
                category,
                label: category.label().to_string(),
                total_cents,
                pct: percent(total_cents, grand_total),
            })
        })
        .collect();
    rows.sort_by(|a, b| b.total_cents.cmp(&a.total_cents));
    rows
}

/// Count per status in declaration order, zeros included.
pub fn projects_by_status(projects: &[Project]) -> Vec<StatusCount<ProjectStatus>> {
    ProjectStatus::iter()
        .map(|status| StatusCount {
            status,
            count: projects.iter().filter(|p| p.status == status).count(),
        })
        .collect()
}

pub fn tasks_by_status(tasks: &[Task]) -> Vec<StatusCount<TaskStatus>> {
    TaskStatus::iter()
        .map(|status| StatusCount {
            status,
            count: tasks.iter().filter(|t| t.status == status).count(),
        })
        .collect()
}

fn month_index(year: i32, month: u32) -> i64 {
    year as i64 * 12 + month as i64 - 1
}

fn from_month_index(index: i64) -> (i32, u32) {
    (index.div_euclid(12) as i32, index.rem_euclid(12) as u32 + 1)
}

/// First month of a `months`-long window ending at the month of `today`.
pub fn window_start(today: NaiveDate, months: u32) -> (i32, u32) {
    let back = months.max(1) as i64 - 1;
    from_month_index(month_index(today.year(), today.month()) - back)
}

/// Contiguous `months` points starting at `from`; months without movements are zero.
pub fn monthly_series(
    movements: impl IntoIterator<Item = Movement>,
    from: (i32, u32),
    months: u32,
) -> Vec<MonthlyPoint> {
    let start = month_index(from.0, from.1);
    let mut points: Vec<MonthlyPoint> = (0..months as i64)
        .map(|offset| {
            let (year, month) = from_month_index(start + offset);
            MonthlyPoint {
                label: format_month(year, month),
                year,
                month,
                income_cents: 0,
                expense_cents: 0,
                balance_cents: 0,
                balance_label: String::new(),
            }
        })
        .collect();

    for movement in movements {
        let offset = month_index(movement.date.year(), movement.date.month()) - start;
        let Some(point) = usize::try_from(offset).ok().and_then(|i| points.get_mut(i)) else {
            continue;
        };
        match movement.kind {
            LedgerKind::Income => point.income_cents += movement.amount_cents,
            LedgerKind::Expense => point.expense_cents += movement.amount_cents,
        }
    }

    for point in &mut points {
        point.balance_cents = point.income_cents - point.expense_cents;
        point.balance_label = format_compact_currency(point.balance_cents);
    }
    points
}

/// Progress of one project from its own tasks and expenses.
pub fn project_progress(
    project: &Project,
    tasks: &[Task],
    expenses: &[Expense],
    today: NaiveDate,
) -> ProjectProgress {
    let own_tasks: Vec<&Task> = tasks.iter().filter(|t| t.project_id == project.id).collect();
    let completed = own_tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .count();
    let spent_cents: i64 = expenses
        .iter()
        .filter(|e| e.project_id == project.id)
        .map(|e| e.amount_cents)
        .sum();

    ProjectProgress {
        task_pct: percent(completed as i64, own_tasks.len() as i64),
        budget_used_pct: percent(spent_cents, project.budget_cents),
        spent_cents,
        remaining_cents: project.budget_cents - spent_cents,
        over_budget: project.budget_cents > 0 && spent_cents > project.budget_cents,
        overdue: project.is_overdue(today),
        days_to_deadline: project.end_date.map(|end| days_until(end, today)),
        deadline_label: project.end_date.map(|end| relative_days(end, today)),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Dashboard {
    pub kpis: ProjectKpis,
    pub labels: KpiLabels,
    pub expenses_by_category: Vec<CategoryTotal>,
    pub projects_by_status: Vec<StatusCount<ProjectStatus>>,
    pub monthly: Vec<MonthlyPoint>,
    pub overdue_tasks: Vec<Task>,
    pub open_incidents: Vec<Incident>,
    pub upcoming_surveys: Vec<Survey>,
    pub upcoming_meetings: Vec<ClientMeeting>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ProjectSummary {
    pub project: Project,
    pub manager_name: Option<String>,
    pub progress: ProjectProgress,
    pub open_incidents: usize,
    pub total_incidents: usize,
    pub latest_report: Option<Report>,
    pub tasks_by_status: Vec<StatusCount<TaskStatus>>,
}

/// Awaits one fetch; a failure is logged and replaced by the default value.
async fn or_default<T, F>(source: &'static str, fetch: F) -> T
where
    T: Default,
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match fetch.await {
        Ok(rows) => rows,
        Err(e) => {
            warn!(source, error = %e, "Dashboard query failed, using empty data");
            T::default()
        }
    }
}

pub struct DashboardService;

impl DashboardService {
    pub async fn load(pool: &SqlitePool, now: DateTime<Utc>, currency: &str) -> Dashboard {
        let today = now.date_naive();
        let projects = or_default("projects", Project::find_all(pool)).await;
        let tasks = or_default("tasks", Task::find_all(pool)).await;
        let expenses = or_default("expenses", Expense::find_all(pool)).await;
        let incidents = or_default("incidents", Incident::find_all(pool)).await;
        let ledger = or_default("ledger_entries", LedgerEntry::find_all(pool)).await;
        let surveys = or_default("surveys", Survey::find_upcoming(pool, today)).await;
        let meetings = or_default("client_meetings", ClientMeeting::find_upcoming(pool, now)).await;

        let movements = ledger
            .iter()
            .map(Movement::from)
            .chain(expenses.iter().map(Movement::from));
        let monthly = monthly_series(movements, window_start(today, DEFAULT_MONTHS), DEFAULT_MONTHS);

        let mut open_incidents: Vec<Incident> =
            incidents.iter().filter(|i| i.status.is_open()).cloned().collect();
        open_incidents.sort_by(|a, b| b.severity.cmp(&a.severity));
        open_incidents.truncate(LIST_LIMIT);

        let mut overdue_tasks: Vec<Task> =
            tasks.iter().filter(|t| t.is_overdue(today)).cloned().collect();
        overdue_tasks.sort_by_key(|t| t.due_date);
        overdue_tasks.truncate(LIST_LIMIT);

        let kpis = compute_kpis(&projects, &tasks, &expenses, &incidents, today);
        Dashboard {
            labels: KpiLabels::new(&kpis, currency, today),
            kpis,
            expenses_by_category: expenses_by_category(&expenses),
            projects_by_status: projects_by_status(&projects),
            monthly,
            overdue_tasks,
            open_incidents,
            upcoming_surveys: surveys.into_iter().take(LIST_LIMIT).collect(),
            upcoming_meetings: meetings.into_iter().take(LIST_LIMIT).collect(),
        }
    }

    /// Per-project view. Only the project lookup itself is allowed to fail.
    pub async fn project_summary(
        pool: &SqlitePool,
        project_id: Uuid,
        today: NaiveDate,
    ) -> Result<Option<ProjectSummary>, DashboardError> {
        let Some(project) = Project::find_by_id(pool, project_id).await? else {
            return Ok(None);
        };

        let tasks = or_default("tasks", Task::find_by_project_id(pool, project_id)).await;
        let expenses = or_default("expenses", Expense::find_by_project_id(pool, project_id)).await;
        let incidents = or_default("incidents", Incident::find_by_project_id(pool, project_id)).await;
        let reports = or_default("reports", Report::find_by_project_id(pool, project_id)).await;
        let manager = match project.manager_id {
            Some(id) => or_default("profiles", Profile::find_by_id(pool, id)).await,
            None => None,
        };

        Ok(Some(ProjectSummary {
            progress: project_progress(&project, &tasks, &expenses, today),
            manager_name: manager.map(|m| m.full_name),
            open_incidents: incidents.iter().filter(|i| i.status.is_open()).count(),
            total_incidents: incidents.len(),
            latest_report: reports.into_iter().next(),
            tasks_by_status: tasks_by_status(&tasks),
            project,
        }))
    }
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::{
            expense::CreateExpense,
            incident::{CreateIncident, IncidentStatus},
            project::CreateProject,
            task::CreateTask,
        },
    };

    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn project(status: ProjectStatus, budget_cents: i64) -> Project {
        let now = Utc::now();
        Project {
            id: Uuid::new_v4(),
            name: "Obra".into(),
            client: "Cliente".into(),
            location: None,
            description: None,
            status,
            budget_cents,
            start_date: None,
            end_date: None,
            manager_id: None,
            latitude: None,
            longitude: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn task(project_id: Uuid, status: TaskStatus, due: Option<NaiveDate>) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            project_id,
            title: "Tarea".into(),
            description: None,
            status,
            priority: Default::default(),
            assignee_id: None,
            due_date: due,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn expense(project_id: Uuid, category: ExpenseCategory, amount_cents: i64, date: NaiveDate) -> Expense {
        let now = Utc::now();
        Expense {
            id: Uuid::new_v4(),
            project_id,
            concept: "Gasto".into(),
            category,
            amount_cents,
            expense_date: date,
            supplier: None,
            invoice_number: None,
            receipt_path: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn incident(project_id: Uuid, severity: IncidentSeverity, status: IncidentStatus) -> Incident {
        let now = Utc::now();
        Incident {
            id: Uuid::new_v4(),
            project_id,
            title: "Incidencia".into(),
            description: None,
            severity,
            status,
            reported_by: None,
            occurred_on: d(2026, 10, 1),
            resolved_at: None,
            resolution: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn kpis_are_zero_safe() {
        let kpis = compute_kpis(&[], &[], &[], &[], d(2026, 10, 16));
        assert_eq!(kpis, ProjectKpis::default());
    }

    #[test]
    fn kpis_count_and_ratio() {
        let today = d(2026, 10, 16);
        let active = project(ProjectStatus::Active, 100_000);
        let cancelled = project(ProjectStatus::Cancelled, 50_000);
        let tasks = vec![
            task(active.id, TaskStatus::Completed, None),
            task(active.id, TaskStatus::Pending, Some(d(2026, 10, 1))),
            task(active.id, TaskStatus::InProgress, Some(d(2026, 12, 1))),
            task(active.id, TaskStatus::Completed, Some(d(2026, 9, 1))),
        ];
        let expenses = vec![
            expense(active.id, ExpenseCategory::Labor, 25_000, today),
            expense(cancelled.id, ExpenseCategory::Materials, 90_000, today),
        ];
        let incidents = vec![
            incident(active.id, IncidentSeverity::Critical, IncidentStatus::Open),
            incident(active.id, IncidentSeverity::Critical, IncidentStatus::Resolved),
            incident(active.id, IncidentSeverity::Low, IncidentStatus::InProgress),
        ];

        let kpis = compute_kpis(&[active, cancelled], &tasks, &expenses, &incidents, today);
        assert_eq!(kpis.active_projects, 1);
        assert_eq!(kpis.total_projects, 2);
        assert_eq!(kpis.total_budget_cents, 100_000);
        assert_eq!(kpis.total_spent_cents, 25_000);
        assert_eq!(kpis.budget_used_pct, 25.0);
        assert_eq!(kpis.open_incidents, 2);
        assert_eq!(kpis.critical_incidents, 1);
        assert_eq!(kpis.pending_tasks, 2);
        assert_eq!(kpis.overdue_tasks, 1);
        assert_eq!(kpis.task_completion_pct, 50.0);
    }

    #[test]
    fn categories_sorted_with_share() {
        let p = Uuid::new_v4();
        let today = d(2026, 10, 16);
        let rows = expenses_by_category(&[
            expense(p, ExpenseCategory::Materials, 10_000, today),
            expense(p, ExpenseCategory::Labor, 30_000, today),
            expense(p, ExpenseCategory::Materials, 20_000, today),
            expense(p, ExpenseCategory::Permits, 40_000, today),
        ]);
        let order: Vec<ExpenseCategory> = rows.iter().map(|r| r.category).collect();
        // Materials and Labor tie at 30k; declaration order breaks the tie
        assert_eq!(
            order,
            vec![ExpenseCategory::Permits, ExpenseCategory::Materials, ExpenseCategory::Labor]
        );
        assert_eq!(rows[0].label, "Permisos");
        assert_eq!(rows[0].pct, 40.0);
        assert_eq!(rows[2].pct, 30.0);
    }

    #[test]
    fn status_counts_include_zeros() {
        let counts = projects_by_status(&[
            project(ProjectStatus::Active, 0),
            project(ProjectStatus::Active, 0),
            project(ProjectStatus::Completed, 0),
        ]);
        let pairs: Vec<(ProjectStatus, usize)> = counts.iter().map(|c| (c.status, c.count)).collect();
        assert_eq!(
            pairs,
            vec![
                (ProjectStatus::Planning, 0),
                (ProjectStatus::Active, 2),
                (ProjectStatus::Paused, 0),
                (ProjectStatus::Completed, 1),
                (ProjectStatus::Cancelled, 0),
            ]
        );
    }

    #[test]
    fn monthly_series_is_contiguous_across_years() {
        let movements = vec![
            Movement { date: d(2026, 11, 3), kind: LedgerKind::Income, amount_cents: 500 },
            Movement { date: d(2026, 11, 20), kind: LedgerKind::Expense, amount_cents: 200 },
            Movement { date: d(2027, 1, 1), kind: LedgerKind::Expense, amount_cents: 100 },
            Movement { date: d(2026, 6, 1), kind: LedgerKind::Income, amount_cents: 9_999 },
        ];
        let series = monthly_series(movements, (2026, 11), 4);
        let months: Vec<(i32, u32)> = series.iter().map(|p| (p.year, p.month)).collect();
        assert_eq!(months, vec![(2026, 11), (2026, 12), (2027, 1), (2027, 2)]);
        assert_eq!(series[0].balance_cents, 300);
        assert_eq!(series[1].income_cents, 0);
        assert_eq!(series[2].balance_cents, -100);
        assert_eq!(series[0].label, "nov 2026");
        assert_eq!(series[2].balance_label, "-$1");
    }

    #[test]
    fn window_ends_at_current_month() {
        assert_eq!(window_start(d(2026, 3, 15), 6), (2025, 10));
        assert_eq!(window_start(d(2026, 3, 15), 1), (2026, 3));
    }

    #[test]
    fn progress_detects_over_budget_and_overdue() {
        let today = d(2026, 10, 16);
        let mut p = project(ProjectStatus::Active, 10_000);
        p.end_date = Some(d(2026, 10, 1));
        let other = Uuid::new_v4();
        let tasks = vec![
            task(p.id, TaskStatus::Completed, None),
            task(p.id, TaskStatus::Pending, None),
            task(p.id, TaskStatus::Pending, None),
            task(other, TaskStatus::Completed, None),
        ];
        let expenses = vec![
            expense(p.id, ExpenseCategory::Materials, 12_000, today),
            expense(other, ExpenseCategory::Materials, 99_000, today),
        ];
        let progress = project_progress(&p, &tasks, &expenses, today);
        assert_eq!(progress.task_pct, 33.3);
        assert_eq!(progress.spent_cents, 12_000);
        assert_eq!(progress.remaining_cents, -2_000);
        assert!(progress.over_budget);
        assert!(progress.overdue);
        assert_eq!(progress.budget_used_pct, 120.0);
        assert_eq!(progress.days_to_deadline, Some(-15));
        assert_eq!(progress.deadline_label.as_deref(), Some("hace 15 días"));
    }

    #[tokio::test]
    async fn load_survives_a_broken_table() {
        let pool = DBService::new_in_memory().await.unwrap().pool;
        let mut data = CreateProject::named("Torre Sur", "Grupo Norte");
        data.status = Some(ProjectStatus::Active);
        data.budget_cents = Some(1_000_000);
        let p = Project::create(&pool, &data, Uuid::new_v4()).await.unwrap();
        Task::create(&pool, &CreateTask::titled(p.id, "Trazo"), Uuid::new_v4()).await.unwrap();
        Expense::create(
            &pool,
            &CreateExpense {
                project_id: p.id,
                concept: "Varilla".into(),
                category: Some(ExpenseCategory::Materials),
                amount_cents: 250_000,
                expense_date: Utc::now().date_naive(),
                supplier: None,
                invoice_number: None,
                receipt_path: None,
            },
            None,
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        Incident::create(
            &pool,
            &CreateIncident {
                project_id: p.id,
                title: "Fuga".into(),
                description: None,
                severity: None,
                occurred_on: Utc::now().date_naive(),
            },
            None,
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        sqlx::query("DROP TABLE incidents").execute(&pool).await.unwrap();

        let dashboard = DashboardService::load(&pool, Utc::now(), "MXN").await;
        assert_eq!(dashboard.kpis.active_projects, 1);
        assert_eq!(dashboard.kpis.open_incidents, 0);
        assert_eq!(dashboard.kpis.budget_used_pct, 25.0);
        assert_eq!(dashboard.labels.total_budget, "$10,000.00 MXN");
        assert_eq!(dashboard.labels.remaining, "$7,500.00 MXN");
        assert_eq!(dashboard.monthly.len(), DEFAULT_MONTHS as usize);
        assert_eq!(dashboard.monthly.last().map(|m| m.expense_cents), Some(250_000));
        assert_eq!(dashboard.expenses_by_category.len(), 1);
    }

    #[tokio::test]
    async fn project_summary_for_missing_project_is_none() {
        let pool = DBService::new_in_memory().await.unwrap().pool;
        let summary = DashboardService::project_summary(&pool, Uuid::new_v4(), d(2026, 10, 16))
            .await
            .unwrap();
        assert!(summary.is_none());
    }

    #[tokio::test]
    async fn project_summary_counts_tasks() {
        let pool = DBService::new_in_memory().await.unwrap().pool;
        let p = Project::create(&pool, &CreateProject::named("Casa Club", "Residencial"), Uuid::new_v4())
            .await
            .unwrap();
        let t = Task::create(&pool, &CreateTask::titled(p.id, "Acabados"), Uuid::new_v4())
            .await
            .unwrap();
        Task::update_status(&pool, t.id, TaskStatus::Completed).await.unwrap();
        Task::create(&pool, &CreateTask::titled(p.id, "Jardinería"), Uuid::new_v4())
            .await
            .unwrap();

        let summary = DashboardService::project_summary(&pool, p.id, d(2026, 10, 16))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.progress.task_pct, 50.0);
        let completed = summary
            .tasks_by_status
            .iter()
            .find(|c| c.status == TaskStatus::Completed)
            .map(|c| c.count);
        assert_eq!(completed, Some(1));
        assert!(summary.latest_report.is_none());
    }
}
