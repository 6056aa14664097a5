//! Shared fixtures: an in-memory store seeded with three schools across two
//! cities and one account of every role.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::hash_password;
use crate::database::models::{Event, ScheduleSlot, School, Student, User};
use crate::database::{MemoryStore, Store};
use crate::services::Caller;
use crate::types::{DayOfWeek, Role};

pub const PASSWORD: &str = "password123";

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    /// Springfield
    pub north: School,
    /// Springfield
    pub south: School,
    /// Metropolis
    pub metro: School,
    pub main_admin: User,
    pub district_admin: User,
    pub school_admin: User,
    pub teacher: User,
    pub metro_teacher: User,
    pub parent: User,
    pub student_user: User,
    /// North High, linked to `student_user`, child of `parent`.
    pub alice: Student,
    /// South High.
    pub bob: Student,
    /// Metro Academy.
    pub carol: Student,
    /// North High, taught by `teacher`, active.
    pub lesson: Event,
}

impl Fixture {
    pub async fn seeded() -> Self {
        Self::seeded_into(MemoryStore::new()).await
    }

    /// Same fixture over a store whose list endpoints return at most
    /// `list_limit` rows.
    pub async fn seeded_with_list_limit(list_limit: usize) -> Self {
        Self::seeded_into(MemoryStore::with_list_limit(list_limit)).await
    }

    async fn seeded_into(store: MemoryStore) -> Self {
        Self::try_seeded(store).await.unwrap_or_else(|e| panic!("fixture seeding failed: {}", e))
    }

    async fn try_seeded(store: MemoryStore) -> anyhow::Result<Self> {
        let store = Arc::new(store);

        let north = store.schools().insert(School::new("North High", "Springfield")).await?;
        let south = store.schools().insert(School::new("South High", "Springfield")).await?;
        let metro = store.schools().insert(School::new("Metro Academy", "Metropolis")).await?;

        let account = |email: &str, role: Role| User::new(email, hash_password(PASSWORD), role);

        let main_admin = store.users().insert(account("main@edu.test", Role::MainAdmin)).await?;
        let district_admin = store
            .users()
            .insert(account("district@edu.test", Role::DistrictAdmin).with_city("Springfield").with_name("Dana District"))
            .await?;
        let school_admin = store
            .users()
            .insert(account("admin@north.test", Role::SchoolAdmin).with_school(north.id).with_name("Sam Admin"))
            .await?;
        let teacher = store
            .users()
            .insert(account("teacher@north.test", Role::Teacher).with_school(north.id).with_name("Tess Teacher"))
            .await?;
        let metro_teacher = store
            .users()
            .insert(account("teacher@metro.test", Role::Teacher).with_school(metro.id).with_name("Max Teacher"))
            .await?;
        let student_user = store
            .users()
            .insert(account("alice@north.test", Role::Student).with_school(north.id))
            .await?;

        let alice = store.students().insert(student(&north, student_user.id, "Alice", "10A")).await?;
        let bob_user = store.users().insert(account("bob@south.test", Role::Student).with_school(south.id)).await?;
        let bob = store.students().insert(student(&south, bob_user.id, "Bob", "9B")).await?;
        let carol_user = store.users().insert(account("carol@metro.test", Role::Student).with_school(metro.id)).await?;
        let carol = store.students().insert(student(&metro, carol_user.id, "Carol", "11C")).await?;

        let mut parent = account("parent@north.test", Role::Parent).with_school(north.id).with_name("Pat Parent");
        parent.children.push(alice.id);
        let parent = store.users().insert(parent).await?;

        let lesson = store.events().insert(event(&north, &teacher, "Урок Истории", true)).await?;

        Ok(Self {
            store,
            north,
            south,
            metro,
            main_admin,
            district_admin,
            school_admin,
            teacher,
            metro_teacher,
            parent,
            student_user,
            alice,
            bob,
            carol,
            lesson,
        })
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn shared_store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    pub fn caller(user: &User) -> Caller {
        Caller {
            user_id: user.id,
            role: user.role,
            school_id: user.school_id,
            city: user.city.clone(),
        }
    }

    pub fn main_admin(&self) -> Caller {
        Self::caller(&self.main_admin)
    }

    pub fn district_admin(&self) -> Caller {
        Self::caller(&self.district_admin)
    }

    pub fn school_admin(&self) -> Caller {
        Self::caller(&self.school_admin)
    }

    pub fn teacher(&self) -> Caller {
        Self::caller(&self.teacher)
    }

    pub fn metro_teacher(&self) -> Caller {
        Self::caller(&self.metro_teacher)
    }

    pub fn parent(&self) -> Caller {
        Self::caller(&self.parent)
    }

    pub fn student(&self) -> Caller {
        Self::caller(&self.student_user)
    }

    /// Adds an event at `school` taught by `teacher`.
    pub async fn add_event(&self, school: &School, teacher: &User, name: &str, active: bool) -> Event {
        self.store
            .events()
            .insert(event(school, teacher, name, active))
            .await
            .unwrap_or_else(|e| panic!("event insert failed: {}", e))
    }
}

fn student(school: &School, user_id: Uuid, name: &str, group: &str) -> Student {
    Student {
        id: Uuid::new_v4(),
        name: name.to_string(),
        group: group.to_string(),
        specialty: "General".to_string(),
        qr_code: Uuid::new_v4().to_string(),
        school_id: school.id,
        user_id,
        created_at: Utc::now(),
    }
}

fn event(school: &School, teacher: &User, name: &str, active: bool) -> Event {
    let now = Utc::now();
    Event {
        id: Uuid::new_v4(),
        name: name.to_string(),
        schedule: vec![ScheduleSlot {
            day_of_week: DayOfWeek::Monday,
            start_time: "09:00".to_string(),
            end_time: "09:45".to_string(),
        }],
        description: None,
        is_active: active,
        school_id: school.id,
        teacher_id: teacher.id,
        created_at: now,
        updated_at: now,
    }
}
