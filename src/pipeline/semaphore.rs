//! A plain counting semaphore (`Mutex<u64>` + `Condvar`), the direct Rust
//! counterpart of POSIX `sem_t`: the original pipeline's three-semaphore
//! handshake per worker (`start`, `cmp_done`, `write_done`) is `sem_init` /
//! `sem_post` / `sem_wait` verbatim, so this type mirrors that contract
//! exactly rather than building it out of channels or atomics.

use std::sync::{Condvar, Mutex};

pub struct Semaphore {
    state: Mutex<u64>,
    cv: Condvar,
}

impl Semaphore {
    pub fn new(initial: u64) -> Self {
        Semaphore { state: Mutex::new(initial), cv: Condvar::new() }
    }

    pub fn post(&self) {
        let mut count = self.state.lock().unwrap();
        *count += 1;
        self.cv.notify_one();
    }

    pub fn wait(&self) {
        let mut count = self.state.lock().unwrap();
        while *count == 0 {
            count = self.cv.wait(count).unwrap();
        }
        *count -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_blocks_until_post() {
        let sem = Arc::new(Semaphore::new(0));
        let sem2 = Arc::clone(&sem);
        let handle = thread::spawn(move || {
            sem2.wait();
        });
        thread::sleep(std::time::Duration::from_millis(20));
        sem.post();
        handle.join().unwrap();
    }

    #[test]
    fn initial_count_one_lets_first_wait_through_immediately() {
        let sem = Semaphore::new(1);
        sem.wait(); // must not block
    }
}
