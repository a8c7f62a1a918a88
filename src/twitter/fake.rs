//! Scripted in-memory provider for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Page, PageRequest, TimelineTweet, TwitterApi, TwitterError, TwitterUser};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Endpoint {
    Timeline,
    Likers,
    Retweeters,
}

#[derive(Default)]
struct State {
    pages: HashMap<(Endpoint, String), Vec<Vec<TwitterUser>>>,
    timeline: Vec<Vec<TimelineTweet>>,
    users: HashMap<String, TwitterUser>,
    failures: HashMap<(Endpoint, String, usize), VecDeque<TwitterError>>,
    calls: HashMap<(Endpoint, String), usize>,
    requests: Vec<PageRequest>,
    lookups: Vec<String>,
}

#[derive(Default)]
pub struct FakeTwitter {
    state: Mutex<State>,
}

impl FakeTwitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_timeline(&self, pages: Vec<Vec<TimelineTweet>>) {
        self.state.lock().unwrap().timeline = pages;
    }

    pub fn set_likers(&self, tweet_id: &str, pages: Vec<Vec<TwitterUser>>) {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert((Endpoint::Likers, tweet_id.to_string()), pages);
    }

    pub fn set_retweeters(&self, tweet_id: &str, pages: Vec<Vec<TwitterUser>>) {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert((Endpoint::Retweeters, tweet_id.to_string()), pages);
    }

    pub fn add_user(&self, user: TwitterUser) {
        self.state
            .lock()
            .unwrap()
            .users
            .insert(user.username.to_lowercase(), user);
    }

    /// Queue an error for the given zero-based page; each queued error is served once.
    pub fn fail_liker_page(&self, tweet_id: &str, page: usize, error: TwitterError) {
        self.fail(Endpoint::Likers, tweet_id, page, error);
    }

    pub fn fail_retweeter_page(&self, tweet_id: &str, page: usize, error: TwitterError) {
        self.fail(Endpoint::Retweeters, tweet_id, page, error);
    }

    pub fn fail_timeline_page(&self, page: usize, error: TwitterError) {
        self.fail(Endpoint::Timeline, "", page, error);
    }

    fn fail(&self, endpoint: Endpoint, target: &str, page: usize, error: TwitterError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry((endpoint, target.to_string(), page))
            .or_default()
            .push_back(error);
    }

    pub fn liker_calls(&self, tweet_id: &str) -> usize {
        self.calls(Endpoint::Likers, tweet_id)
    }

    pub fn retweeter_calls(&self, tweet_id: &str) -> usize {
        self.calls(Endpoint::Retweeters, tweet_id)
    }

    pub fn timeline_calls(&self) -> usize {
        self.calls(Endpoint::Timeline, "")
    }

    pub fn engagement_calls(&self) -> usize {
        let state = self.state.lock().unwrap();
        state
            .calls
            .iter()
            .filter(|((endpoint, _), _)| *endpoint != Endpoint::Timeline)
            .map(|(_, count)| *count)
            .sum()
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn lookups(&self) -> Vec<String> {
        self.state.lock().unwrap().lookups.clone()
    }

    fn calls(&self, endpoint: Endpoint, target: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(&(endpoint, target.to_string()))
            .copied()
            .unwrap_or(0)
    }

    fn serve<T: Clone>(
        &self,
        endpoint: Endpoint,
        request: &PageRequest,
        pages: impl FnOnce(&State, &str) -> Option<Vec<Vec<T>>>,
    ) -> Result<Page<T>, TwitterError> {
        let mut state = self.state.lock().unwrap();
        // the timeline is keyed without a target so tests don't need the account id
        let target = match endpoint {
            Endpoint::Timeline => String::new(),
            _ => request.target_id.clone(),
        };
        *state.calls.entry((endpoint, target.clone())).or_default() += 1;
        state.requests.push(request.clone());

        let index = match &request.pagination_token {
            None => 0,
            Some(token) => token
                .rsplit(':')
                .next()
                .and_then(|n| n.parse().ok())
                .unwrap_or(0),
        };

        if let Some(error) = state
            .failures
            .get_mut(&(endpoint, target.clone(), index))
            .and_then(|queue| queue.pop_front())
        {
            return Err(error);
        }

        let pages = pages(&state, &target).unwrap_or_default();
        let items = pages.get(index).cloned().unwrap_or_default();
        let next_token = if index + 1 < pages.len() {
            Some(format!("{}:{}", request.target_id, index + 1))
        } else {
            None
        };
        Ok(Page { items, next_token })
    }
}

#[async_trait]
impl TwitterApi for FakeTwitter {
    async fn fetch_timeline(
        &self,
        request: PageRequest,
    ) -> Result<Page<TimelineTweet>, TwitterError> {
        self.serve(Endpoint::Timeline, &request, |state, _| {
            Some(state.timeline.clone())
        })
    }

    async fn fetch_likers(&self, request: PageRequest) -> Result<Page<TwitterUser>, TwitterError> {
        self.serve(Endpoint::Likers, &request, |state, target| {
            state.pages.get(&(Endpoint::Likers, target.to_string())).cloned()
        })
    }

    async fn fetch_retweeters(
        &self,
        request: PageRequest,
    ) -> Result<Page<TwitterUser>, TwitterError> {
        self.serve(Endpoint::Retweeters, &request, |state, target| {
            state
                .pages
                .get(&(Endpoint::Retweeters, target.to_string()))
                .cloned()
        })
    }

    async fn fetch_user_by_handle(
        &self,
        handle: &str,
    ) -> Result<Option<TwitterUser>, TwitterError> {
        let mut state = self.state.lock().unwrap();
        state.lookups.push(handle.to_string());
        Ok(state.users.get(&handle.to_lowercase()).cloned())
    }
}
