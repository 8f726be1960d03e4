use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use sha2::{Digest, Sha256};
use shared::{
    domain::{ContainerId, ItemId, Priority, TaskStatus, UserId},
    protocol::{Container, Item, User},
};
use thiserror::Error;
use tokio::sync::RwLock;

/// In-memory board state shared by all request handlers.
#[derive(Clone, Default)]
pub struct Storage {
    inner: Arc<RwLock<BoardData>>,
}

#[derive(Default)]
struct BoardData {
    users: Vec<StoredUser>,
    columns: Vec<Container>,
    tasks: Vec<StoredTask>,
}

struct StoredUser {
    user: User,
    password_digest: [u8; 32],
}

struct StoredTask {
    item: Item,
    column_id: Option<ContainerId>,
    assignee_id: Option<UserId>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub status: TaskStatus,
    pub column: Option<ContainerId>,
    pub position: u32,
    pub assignee: Option<UserId>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NewTask {
    pub fn new(title: impl Into<String>, status: TaskStatus, created_at: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority: Priority::default(),
            status,
            column: None,
            position: 0,
            assignee: None,
            due_date: None,
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("task {0} not found")]
    TaskNotFound(ItemId),
    #[error("column {0} not found")]
    ColumnNotFound(ContainerId),
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage seeded with the demo accounts, columns and tasks.
    pub async fn demo() -> Self {
        let storage = Self::new();
        seed_demo(&storage).await;
        storage
    }

    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> UserId {
        let mut data = self.inner.write().await;
        let id = UserId(data.users.len() as i64 + 1);
        let full_name = format!("{first_name} {last_name}").trim().to_string();
        data.users.push(StoredUser {
            user: User {
                id,
                username: username.to_string(),
                email: email.to_lowercase(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                full_name,
            },
            password_digest: password_digest(username, password),
        });
        id
    }

    /// Matches `login` against usernames exactly and emails case-insensitively.
    pub async fn verify_login(&self, login: &str, password: &str) -> Option<User> {
        let login = login.trim();
        let data = self.inner.read().await;
        let stored = data.users.iter().find(|stored| {
            stored.user.username == login || stored.user.email.eq_ignore_ascii_case(login)
        })?;
        (stored.password_digest == password_digest(&stored.user.username, password))
            .then(|| stored.user.clone())
    }

    pub async fn user(&self, id: UserId) -> Option<User> {
        let data = self.inner.read().await;
        data.users
            .iter()
            .find(|stored| stored.user.id == id)
            .map(|stored| stored.user.clone())
    }

    pub async fn create_column(&self, name: &str, position: u32, is_default: bool) -> ContainerId {
        let mut data = self.inner.write().await;
        let id = ContainerId::Remote(data.columns.len() as i64 + 1);
        data.columns.push(Container {
            id: id.clone(),
            name: name.to_string(),
            position,
            is_default,
            task_count: None,
        });
        id
    }

    pub async fn create_task(&self, task: NewTask) -> ItemId {
        let mut data = self.inner.write().await;
        let id = ItemId(data.tasks.len() as i64 + 1);
        data.tasks.push(StoredTask {
            item: Item {
                id,
                title: task.title,
                description: task.description,
                priority: task.priority,
                status: task.status,
                assignee: None,
                column: None,
                position: task.position,
                due_date: task.due_date,
                created_at: task.created_at,
            },
            column_id: task.column,
            assignee_id: task.assignee,
        });
        id
    }

    /// Columns ordered by position, each carrying its current task count.
    pub async fn list_columns(&self) -> Vec<Container> {
        let data = self.inner.read().await;
        let mut columns: Vec<Container> = data
            .columns
            .iter()
            .map(|column| {
                let count = data
                    .tasks
                    .iter()
                    .filter(|task| task.column_id.as_ref() == Some(&column.id))
                    .count();
                Container {
                    task_count: Some(count as u32),
                    ..column.clone()
                }
            })
            .collect();
        columns.sort_by_key(|column| column.position);
        columns
    }

    /// Tasks ordered by position, newest first within a position.
    pub async fn list_tasks(&self) -> Vec<Item> {
        let data = self.inner.read().await;
        let mut tasks: Vec<Item> = data.tasks.iter().map(|task| data.render(task)).collect();
        tasks.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        tasks
    }

    #[cfg(test)]
    pub async fn task(&self, id: ItemId) -> Option<Item> {
        let data = self.inner.read().await;
        data.tasks
            .iter()
            .find(|task| task.item.id == id)
            .map(|task| data.render(task))
    }

    /// Reassigns the column (when given) and position of a task.
    pub async fn move_task(
        &self,
        id: ItemId,
        column: Option<&ContainerId>,
        position: u32,
    ) -> Result<Item, MoveError> {
        let mut data = self.inner.write().await;
        let index = data
            .tasks
            .iter()
            .position(|task| task.item.id == id)
            .ok_or(MoveError::TaskNotFound(id))?;
        if let Some(column) = column {
            if !data.columns.iter().any(|known| &known.id == column) {
                return Err(MoveError::ColumnNotFound(column.clone()));
            }
            data.tasks[index].column_id = Some(column.clone());
        }
        data.tasks[index].item.position = position;
        Ok(data.render(&data.tasks[index]))
    }
}

impl BoardData {
    fn render(&self, task: &StoredTask) -> Item {
        let column = task
            .column_id
            .as_ref()
            .and_then(|id| self.columns.iter().find(|column| &column.id == id))
            .cloned();
        let assignee = task.assignee_id.and_then(|id| {
            self.users
                .iter()
                .find(|stored| stored.user.id == id)
                .map(|stored| stored.user.clone())
        });
        Item {
            column,
            assignee,
            ..task.item.clone()
        }
    }
}

fn password_digest(username: &str, password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(username.as_bytes());
    hasher.update([0u8]);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

async fn seed_demo(storage: &Storage) {
    let admin = storage
        .create_user("admin", "admin@example.com", "admin123", "Admin", "User")
        .await;
    let manager = storage
        .create_user("manager", "manager@example.com", "manager123", "Maria", "Petrova")
        .await;
    let employee = storage
        .create_user("employee", "employee@example.com", "employee123", "Ivan", "Sidorov")
        .await;

    let todo = storage.create_column("К выполнению", 0, true).await;
    let in_progress = storage.create_column("В работе", 1, false).await;
    let review = storage.create_column("На проверке", 2, false).await;
    let done = storage.create_column("Выполнено", 3, false).await;

    let base = Utc
        .with_ymd_and_hms(2024, 5, 1, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);
    let seed = [
        ("Подготовить квартальный отчёт", TaskStatus::Todo, Priority::High, &todo, Some(manager)),
        ("Обновить регламент закупок", TaskStatus::Todo, Priority::Medium, &todo, None),
        ("Согласовать договор поставки", TaskStatus::InProgress, Priority::Urgent, &in_progress, Some(employee)),
        ("Настроить резервное копирование", TaskStatus::InProgress, Priority::Medium, &in_progress, Some(admin)),
        ("Проверить счета за апрель", TaskStatus::Review, Priority::Low, &review, Some(manager)),
        ("Провести инструктаж новых сотрудников", TaskStatus::Done, Priority::Medium, &done, Some(employee)),
    ];
    for (offset, (title, status, priority, column, assignee)) in seed.into_iter().enumerate() {
        let mut task = NewTask::new(title, status, base + Duration::hours(offset as i64));
        task.priority = priority;
        task.column = Some(column.clone());
        task.assignee = assignee;
        task.due_date = Some(base + Duration::days(7 + offset as i64));
        storage.create_task(task).await;
    }
    // Legacy rows created before columns existed.
    storage
        .create_task(NewTask::new("Разобрать архив документов", TaskStatus::Review, base))
        .await;
}

#[cfg(test)]
#[path = "tests/storage_tests.rs"]
mod tests;
